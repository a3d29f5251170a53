use crate::domain::{DownloadStatus, SeriesId};
use crate::state::SharedState;

const fn status_icon(status: DownloadStatus) -> &'static str {
    match status {
        DownloadStatus::Completed => "✓",
        DownloadStatus::Downloading => "↓",
        DownloadStatus::Failed => "✗",
        DownloadStatus::Skipped | DownloadStatus::Cancelled => "-",
        DownloadStatus::Pending => "○",
    }
}

pub async fn cmd_episodes(state: &SharedState, id: i32) -> anyhow::Result<()> {
    let series_id = SeriesId::new(id);
    let Some(series) = state.store.get_series(series_id).await? else {
        println!("Series with ID {id} not found.");
        println!("Use 'animedl list' to see series IDs.");
        return Ok(());
    };

    println!("Episodes for: {} ({})", series.title, series.status);
    println!("{:-<70}", "");

    let episodes = state.store.list_episodes(series_id).await?;
    if episodes.is_empty() {
        println!("No episodes recorded yet.");
        return Ok(());
    }

    for episode in &episodes {
        let progress = if episode.status == DownloadStatus::Downloading {
            format!(" {}%", episode.progress)
        } else {
            String::new()
        };

        println!(
            "{} [{}] Episode {} - {}{}",
            status_icon(episode.status),
            episode.id,
            episode.number,
            episode.status,
            progress
        );

        if let Some(error) = &episode.error_message {
            println!("      Error: {error}");
        }
    }

    Ok(())
}

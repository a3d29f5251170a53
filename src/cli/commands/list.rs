use crate::state::SharedState;

pub async fn cmd_list_series(state: &SharedState) -> anyhow::Result<()> {
    let series_list = state.store.list_series().await?;

    if series_list.is_empty() {
        println!("No series in the library.");
        println!("Use 'animedl add <name>' to add one.");
        return Ok(());
    }

    println!("Library ({} series):", series_list.len());
    println!("{:-<70}", "");

    for series in &series_list {
        let statuses = state.store.episode_statuses(series.id).await?;
        let done = statuses
            .iter()
            .filter(|s| **s == crate::domain::DownloadStatus::Completed)
            .count();

        println!("[{}] {}", series.id, series.title);
        println!(
            "    Status: {} | Episodes: {}/{}",
            series.status,
            done,
            statuses.len()
        );
        if let Some(year) = &series.year {
            println!("    Year: {year}");
        }
    }

    Ok(())
}

use crate::domain::{EpisodeId, SeriesId};
use crate::services::EpisodeError;
use crate::state::SharedState;

fn report_rejection(e: EpisodeError) -> anyhow::Result<()> {
    match e {
        EpisodeError::NotFound(_)
        | EpisodeError::SeriesNotFound(_)
        | EpisodeError::InvalidTransition { .. } => {
            println!("✗ {e}");
            Ok(())
        }
        EpisodeError::Database(_) => Err(e.into()),
    }
}

async fn print_episode_status(state: &SharedState, id: EpisodeId) -> anyhow::Result<()> {
    if let Some(episode) = state.store.get_episode(id).await? {
        println!("Episode {} is now {}", episode.id, episode.status);
        if let Some(path) = &episode.file_path {
            println!("    File: {path}");
        }
        if let Some(error) = &episode.error_message {
            println!("    Error: {error}");
        }
    }
    Ok(())
}

/// Queues the episode and runs the queue until it is empty.
async fn run_episode_job<F>(state: &SharedState, id: EpisodeId, submit: F) -> anyhow::Result<()>
where
    F: AsyncFnOnce(EpisodeId) -> Result<bool, EpisodeError>,
{
    state.queue.open();
    let outcome = submit(id).await;

    let result = match outcome {
        Ok(true) => {
            println!("Downloading episode {id}...");
            state.run_pending_jobs().await?;
            print_episode_status(state, id).await
        }
        Ok(false) => {
            println!("Episode {id} could not be queued.");
            Ok(())
        }
        Err(e) => report_rejection(e),
    };

    state.queue.close();
    result
}

pub async fn cmd_download(state: &SharedState, id: i32) -> anyhow::Result<()> {
    run_episode_job(state, EpisodeId::new(id), async |id| {
        state.machine.request_download(id).await
    })
    .await
}

pub async fn cmd_resume(state: &SharedState, id: i32) -> anyhow::Result<()> {
    run_episode_job(state, EpisodeId::new(id), async |id| {
        state.machine.resume(id).await
    })
    .await
}

pub async fn cmd_cancel(state: &SharedState, id: i32) -> anyhow::Result<()> {
    match state.machine.cancel(EpisodeId::new(id)).await {
        Ok(()) => println!("✓ Episode {id} cancelled."),
        Err(e) => report_rejection(e)?,
    }
    Ok(())
}

pub async fn cmd_skip(state: &SharedState, id: i32) -> anyhow::Result<()> {
    match state.machine.skip(EpisodeId::new(id)).await {
        Ok(()) => println!("✓ Episode {id} skipped."),
        Err(e) => report_rejection(e)?,
    }
    Ok(())
}

pub async fn cmd_cancel_series(state: &SharedState, id: i32) -> anyhow::Result<()> {
    match state.machine.cancel_series(SeriesId::new(id)).await {
        Ok(changed) => println!("✓ Cancelled {changed} episode(s)."),
        Err(e) => report_rejection(e)?,
    }
    Ok(())
}

pub async fn cmd_skip_series(state: &SharedState, id: i32) -> anyhow::Result<()> {
    match state.machine.skip_series(SeriesId::new(id)).await {
        Ok(changed) => println!("✓ Skipped {changed} episode(s)."),
        Err(e) => report_rejection(e)?,
    }
    Ok(())
}

pub async fn cmd_resume_series(state: &SharedState, id: i32) -> anyhow::Result<()> {
    state.queue.open();

    let result = match state.machine.resume_series(SeriesId::new(id)).await {
        Ok(0) => {
            println!("Nothing to resume.");
            Ok(())
        }
        Ok(resumed) => {
            println!("Resuming {resumed} episode(s)...");
            state.run_pending_jobs().await.map(|()| {
                println!("✓ Done.");
            })
        }
        Err(e) => report_rejection(e),
    };

    state.queue.close();
    result
}

use crate::state::SharedState;
use std::time::Duration;

pub async fn cmd_check(state: &SharedState) -> anyhow::Result<()> {
    let delay = Duration::from_secs(u64::from(
        state.config().await.scheduler.check_delay_seconds,
    ));

    println!("Checking for new episodes...");
    state.queue.open();

    let report = state.discovery.check_for_new_episodes(delay).await?;
    println!(
        "Checked {} series, {} new episode(s) queued, {} failed.",
        report.checked, report.queued, report.failed
    );

    state.run_pending_jobs().await?;
    state.queue.close();

    println!("✓ Check complete.");
    Ok(())
}

pub async fn cmd_retry_failed(state: &SharedState) -> anyhow::Result<()> {
    state.queue.open();

    let retried = state.discovery.retry_failed_episodes().await?;
    if retried == 0 {
        println!("No failed episodes to retry.");
    } else {
        println!("Retrying {retried} episode(s)...");
        state.run_pending_jobs().await?;
    }

    state.queue.close();
    Ok(())
}

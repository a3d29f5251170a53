use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::services::discovery::DiscoveryBridge;

pub struct Scheduler {
    discovery: Arc<DiscoveryBridge>,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

fn elapsed_ms(start: std::time::Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

async fn check_episodes_job(discovery: &DiscoveryBridge, delay: Duration) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job_name = "check_episodes", "Starting scheduled episode check");

    match discovery.check_for_new_episodes(delay).await {
        Ok(report) => info!(
            event = "job_finished",
            job_name = "check_episodes",
            checked = report.checked,
            queued = report.queued,
            failed = report.failed,
            duration_ms = elapsed_ms(start),
            "Scheduled episode check finished"
        ),
        Err(e) => {
            error!(event = "job_failed", job_name = "check_episodes", error = %e, "Scheduled episode check failed");
        }
    }
}

async fn retry_failed_job(discovery: &DiscoveryBridge) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job_name = "retry_failed", "Starting scheduled failed-episode retry");

    match discovery.retry_failed_episodes().await {
        Ok(retried) => info!(
            event = "job_finished",
            job_name = "retry_failed",
            retried,
            duration_ms = elapsed_ms(start),
            "Scheduled failed-episode retry finished"
        ),
        Err(e) => {
            error!(event = "job_failed", job_name = "retry_failed", error = %e, "Scheduled failed-episode retry failed");
        }
    }
}

impl Scheduler {
    #[must_use]
    pub fn new(discovery: Arc<DiscoveryBridge>, config: SchedulerConfig) -> Self {
        Self {
            discovery,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        if let Some(cron_expr) = &self.config.cron_expression {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    fn delay(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.check_delay_seconds))
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;
        let delay = self.delay();

        let discovery = Arc::clone(&self.discovery);
        let running = Arc::clone(&self.running);
        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let discovery = Arc::clone(&discovery);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                check_episodes_job(&discovery, delay).await;
            })
        })?;
        sched.add(job).await?;
        info!("Episode check scheduled: {}", cron_expr);

        let retry_hours = self.config.retry_failed_interval_hours;
        if retry_hours > 0 {
            let retry_cron = if retry_hours >= 24 {
                // Once a day at midnight
                "0 0 0 * * *".to_string()
            } else {
                format!("0 0 */{retry_hours} * * *")
            };

            let discovery = Arc::clone(&self.discovery);
            let running = Arc::clone(&self.running);
            let retry_job = Job::new_async(&retry_cron, move |_uuid, _lock| {
                let discovery = Arc::clone(&discovery);
                let running = Arc::clone(&running);
                Box::pin(async move {
                    if !*running.read().await {
                        return;
                    }
                    retry_failed_job(&discovery).await;
                })
            })?;
            sched.add(retry_job).await?;
            info!("Failed-episode retry scheduled: {}", retry_cron);
        }

        sched.start().await?;

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let interval_mins = self.config.check_interval_minutes.max(1);
        let retry_hours = self.config.retry_failed_interval_hours;
        let delay = self.delay();

        info!(
            "Scheduler running: Check every {}m, Retry failed every {}h",
            interval_mins, retry_hours
        );

        let mut check_interval = interval(Duration::from_secs(u64::from(interval_mins) * 60));

        // A zero retry interval disables the job; the branch below is then
        // never selected.
        let retry_period = Duration::from_secs(u64::from(retry_hours.max(1)) * 60 * 60);
        let mut retry_interval = tokio::time::interval_at(
            tokio::time::Instant::now() + retry_period,
            retry_period,
        );

        loop {
            tokio::select! {
                _ = check_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    check_episodes_job(&self.discovery, delay).await;
                }
                _ = retry_interval.tick(), if retry_hours > 0 => {
                    if !*self.running.read().await {
                        break;
                    }
                    retry_failed_job(&self.discovery).await;
                }
            }
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Runs one episode check and one failed-episode retry immediately.
    pub async fn run_once(&self) -> Result<()> {
        info!("Running manual check...");

        self.discovery.check_for_new_episodes(self.delay()).await?;
        self.discovery.retry_failed_episodes().await?;

        Ok(())
    }
}

use std::path::Path;
use std::sync::Arc;

mod format;
mod progress;
mod summary;

use format::{format_duration, format_percent, format_rate};
use loadr_core::{MetricsSnapshot, ProfileProgress, ProgressUpdate, TrafficProfile};
use progress::HumanProgress;
use summary::render;

use super::OutputFormatter;
use crate::config::LoadTest;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, file: &Path, test: &LoadTest) {
        println!("test: {}", file.display());
        match &test.plan.profile {
            TrafficProfile::Flat { vus, duration } => {
                println!("profile: flat vus={vus} duration={}", format_duration(*duration));
            }
            TrafficProfile::Staged { stages } => {
                let stages = stages
                    .iter()
                    .map(|s| format!("{}->{}", format_duration(s.duration), s.target))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("profile: staged {stages}");
            }
        }
        println!(
            "scenario: requests={} checks={} grace_period={}",
            test.scenario.steps().len(),
            test.checks.len(),
            format_duration(test.plan.grace_period)
        );
        println!();
    }

    fn progress(&self) -> Option<loadr_core::ProgressFn> {
        let progress = Arc::clone(&self.progress);
        Some(Arc::new(move |u: ProgressUpdate| {
            let (total, message) = progress_message(&u);
            progress.update(total, u.elapsed, message);
        }))
    }

    fn print_summary(&self, snapshot: &MetricsSnapshot) -> anyhow::Result<()> {
        self.progress.finish();
        print!("{}", render(snapshot));
        Ok(())
    }
}

fn progress_message(u: &ProgressUpdate) -> (std::time::Duration, String) {
    let rates = format!(
        " rps={} iters/s={} errors={} checks_failed={}",
        format_rate(u.live.rps_now),
        format_rate(u.live.iterations_per_sec_now),
        format_percent(u.live.error_rate_now),
        u.snapshot.checks_failed
    );

    match &u.profile {
        ProfileProgress::Flat { duration, .. } => (
            *duration,
            format!(
                "vus={}/{} elapsed={}{rates}",
                u.active_vus,
                u.target_vus,
                format_duration(u.elapsed)
            ),
        ),
        ProfileProgress::Staged {
            total_duration,
            stage,
        } => {
            let msg = match stage {
                Some(stage) => format!(
                    "stage={}/{} vus={}/{} elapsed={} stage_remaining={}{rates}",
                    stage.index,
                    stage.count,
                    u.active_vus,
                    u.target_vus,
                    format_duration(u.elapsed),
                    format_duration(stage.stage_remaining)
                ),
                None => format!(
                    "vus={}/{} elapsed={}{rates}",
                    u.active_vus,
                    u.target_vus,
                    format_duration(u.elapsed)
                ),
            };
            (*total_duration, msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadr_core::{ExecutorState, LiveMetrics};
    use std::time::Duration;

    #[test]
    fn flat_progress_message_shows_vus_and_rates() {
        let u = ProgressUpdate {
            tick: 5,
            elapsed: Duration::from_secs(5),
            state: ExecutorState::Running,
            target_vus: 10,
            active_vus: 9,
            profile: ProfileProgress::Flat {
                vus: 10,
                duration: Duration::from_secs(30),
            },
            live: LiveMetrics {
                rps_now: 99.6,
                ..LiveMetrics::default()
            },
            snapshot: MetricsSnapshot::default(),
        };

        let (total, msg) = progress_message(&u);
        assert_eq!(total, Duration::from_secs(30));
        assert_eq!(
            msg,
            "vus=9/10 elapsed=5s rps=100 iters/s=0 errors=0.00% checks_failed=0"
        );
    }
}

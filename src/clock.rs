use std::time::{Duration, SystemTime};

/// Source of the current time and of waits.
///
/// The purger only ever sleeps through this trait so the 30 minute poll
/// loop and the retry delay can be driven instantly in tests.
pub trait Clock {
    fn now(&self) -> SystemTime;

    async fn sleep(
        &self,
        duration: Duration,
    );
}

/// Wall clock + tokio timer.
///
/// The sleep is a tokio timer, so dropping the surrounding future (e.g. on
/// Ctrl-C) cancels the wait immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    async fn sleep(
        &self,
        duration: Duration,
    ) {
        tokio::time::sleep(duration).await;
    }
}

/// Human readable rendering of the waits we announce on the console.
pub fn describe_duration(duration: Duration) -> String {
    let secs = duration.as_secs();

    match secs {
        0 => format!("{} milliseconds", duration.as_millis()),
        1 => String::from("1 second"),
        s if s % 3600 == 0 && s >= 3600 => plural(s / 3600, "hour"),
        s if s % 60 == 0 && s >= 60 => plural(s / 60, "minute"),
        s => plural(s, "second"),
    }
}

fn plural(
    amount: u64,
    unit: &str,
) -> String {
    if amount == 1 {
        format!("1 {unit}")
    } else {
        format!("{amount} {unit}s")
    }
}

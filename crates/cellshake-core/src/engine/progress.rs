#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// A shake stage over `total_steps` objects begins.
    TaskStart { total_steps: u64 },
    /// One object finished its trials on this process.
    TaskIncrement,
    TaskFinish,

    /// Stored coordinate changes were exchanged between processes.
    Broadcast { changes: usize },
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn reporter_forwards_events_to_callback() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|p| {
            seen.lock().unwrap().push(p);
        }));
        reporter.report(Progress::TaskStart { total_steps: 3 });
        reporter.report(Progress::Broadcast { changes: 2 });
        drop(reporter);

        assert_eq!(
            seen.into_inner().unwrap(),
            vec![
                Progress::TaskStart { total_steps: 3 },
                Progress::Broadcast { changes: 2 }
            ]
        );
    }

    #[test]
    fn silent_reporter_ignores_events() {
        ProgressReporter::new().report(Progress::PhaseFinish);
    }
}

use crate::SchedError;

/// Benchmark parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchConfig {
    /// Tasks in the pool, all queued at once.
    pub tasks: usize,
    /// Dequeue/requeue cycles to time.
    pub loops: usize,
    /// Seed for the initial keys.
    pub seed: u64,
    /// Extra log verbosity requested with `-v`.
    pub verbose: u8,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            tasks: 128,
            loops: 200_000,
            seed: 1,
            verbose: 0,
        }
    }
}

pub const USAGE: &str = "usage: smartq [-n TASKS] [-l LOOPS] [-s SEED] [-v]...";

impl BenchConfig {
    /// Parse command line arguments (without the program name) over the defaults.
    ///
    /// `Ok(None)` means help was requested.
    pub fn from_args<I, S>(args: I) -> Result<Option<Self>, SchedError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let flag = arg.as_ref();
            match flag {
                "-n" | "--tasks" => config.tasks = value(flag, args.next())?,
                "-l" | "--loops" => config.loops = value(flag, args.next())?,
                "-s" | "--seed" => config.seed = value(flag, args.next())?,
                "-v" | "--verbose" => config.verbose = config.verbose.saturating_add(1),
                "-h" | "--help" => return Ok(None),
                other => return Err(SchedError::UnknownFlag(other.to_string())),
            }
        }
        if config.tasks == 0 {
            return Err(SchedError::InvalidValue {
                flag: "-n".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(Some(config))
    }
}

fn value<T: std::str::FromStr, S: AsRef<str>>(flag: &str, raw: Option<S>) -> Result<T, SchedError> {
    let raw = raw.ok_or_else(|| SchedError::MissingValue(flag.to_string()))?;
    raw.as_ref()
        .parse()
        .map_err(|_| SchedError::InvalidValue {
            flag: flag.to_string(),
            value: raw.as_ref().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_classic_run() {
        let config = BenchConfig::from_args(Vec::<String>::new()).unwrap().unwrap();
        assert_eq!(config, BenchConfig::default());
        assert_eq!((config.tasks, config.loops), (128, 200_000));
    }

    #[test]
    fn flags_override_defaults() {
        let config = BenchConfig::from_args(["-n", "1024", "-l", "5000", "-s", "9", "-v", "-v"])
            .unwrap()
            .unwrap();
        assert_eq!(config.tasks, 1024);
        assert_eq!(config.loops, 5000);
        assert_eq!(config.seed, 9);
        assert_eq!(config.verbose, 2);
    }

    #[test]
    fn help_short_circuits() {
        assert_eq!(BenchConfig::from_args(["-n", "4", "-h"]).unwrap(), None);
    }

    #[test]
    fn bad_arguments() {
        assert_eq!(
            BenchConfig::from_args(["-n"]).unwrap_err(),
            SchedError::MissingValue("-n".into())
        );
        assert_eq!(
            BenchConfig::from_args(["-l", "lots"]).unwrap_err(),
            SchedError::InvalidValue {
                flag: "-l".into(),
                value: "lots".into()
            }
        );
        assert_eq!(
            BenchConfig::from_args(["-x"]).unwrap_err(),
            SchedError::UnknownFlag("-x".into())
        );
        assert!(matches!(
            BenchConfig::from_args(["-n", "0"]).unwrap_err(),
            SchedError::InvalidValue { .. }
        ));
    }
}

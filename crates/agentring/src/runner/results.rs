use std::fs;
use std::path::{Path, PathBuf};

use agentring_spaces::serde_float;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::env::Info;

const CSV_COLUMNS: [&str; 7] = [
    "episode_number",
    "total_reward",
    "step_count",
    "terminated",
    "truncated",
    "success",
    "error",
];

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("no episodes to aggregate")]
    EmptyResultSet,
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize results: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One recorded environment step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub action: Value,
    pub observation: Value,
    #[serde(with = "serde_float")]
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Info::is_empty")]
    pub info: Info,
}

/// Outcome of one episode. Immutable once the runner hands it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeResult {
    pub episode_number: usize,
    #[serde(with = "serde_float")]
    pub total_reward: f64,
    pub step_count: usize,
    pub terminated: bool,
    pub truncated: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepRecord>,
}

impl EpisodeResult {
    pub(crate) fn started(episode_number: usize) -> Self {
        Self {
            episode_number,
            total_reward: 0.0,
            step_count: 0,
            terminated: false,
            truncated: false,
            success: false,
            error: None,
            steps: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// Aggregate statistics over a result set.
///
/// Means and extrema are `None` for an empty set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSummary {
    pub total_episodes: usize,
    pub successful_episodes: usize,
    pub failed_episodes: usize,
    pub success_rate: f64,
    pub success_percentage: f64,
    #[serde(with = "serde_float")]
    pub total_reward: f64,
    #[serde(with = "serde_float::option")]
    pub average_reward: Option<f64>,
    #[serde(with = "serde_float::option")]
    pub min_reward: Option<f64>,
    #[serde(with = "serde_float::option")]
    pub max_reward: Option<f64>,
    pub total_steps: usize,
    pub average_steps: Option<f64>,
    #[serde(with = "serde_float")]
    pub reward_stddev: f64,
    pub steps_stddev: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episodes: Option<Vec<EpisodeResult>>,
}

#[derive(Serialize)]
struct Export<'a> {
    summary: ResultSummary,
    episodes: &'a [EpisodeResult],
}

/// Episode results in completion order.
///
/// Filters return new sets and leave `self` untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpisodeResults {
    results: Vec<EpisodeResult>,
}

impl EpisodeResults {
    pub fn new(results: Vec<EpisodeResult>) -> Self {
        Self { results }
    }

    pub fn push(&mut self, result: EpisodeResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EpisodeResult> {
        self.results.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EpisodeResult> {
        self.results.iter()
    }

    pub fn as_slice(&self) -> &[EpisodeResult] {
        &self.results
    }

    pub fn total_episodes(&self) -> usize {
        self.results.len()
    }

    pub fn successful_episodes(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed_episodes(&self) -> usize {
        self.total_episodes() - self.successful_episodes()
    }

    /// Fraction of successful episodes; 0.0 for an empty set.
    pub fn success_rate(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.successful_episodes() as f64 / self.total_episodes() as f64
    }

    pub fn success_percentage(&self) -> f64 {
        self.success_rate() * 100.0
    }

    pub fn total_reward(&self) -> f64 {
        self.results.iter().map(|r| r.total_reward).sum()
    }

    pub fn total_steps(&self) -> usize {
        self.results.iter().map(|r| r.step_count).sum()
    }

    pub fn average_reward(&self) -> Result<f64, ResultsError> {
        mean(self.rewards())
    }

    pub fn average_steps(&self) -> Result<f64, ResultsError> {
        mean(self.step_counts())
    }

    pub fn min_reward(&self) -> Result<f64, ResultsError> {
        self.rewards()
            .reduce(f64::min)
            .ok_or(ResultsError::EmptyResultSet)
    }

    pub fn max_reward(&self) -> Result<f64, ResultsError> {
        self.rewards()
            .reduce(f64::max)
            .ok_or(ResultsError::EmptyResultSet)
    }

    /// Sample standard deviation of episode rewards; 0.0 below two episodes.
    pub fn reward_stddev(&self) -> f64 {
        sample_stddev(self.rewards())
    }

    /// Sample standard deviation of episode lengths; 0.0 below two episodes.
    pub fn steps_stddev(&self) -> f64 {
        sample_stddev(self.step_counts())
    }

    pub fn filter_by_success(&self, successful: bool) -> Self {
        self.filtered(|r| r.success == successful)
    }

    /// Episodes whose total reward is at least `min`.
    pub fn filter_by_reward(&self, min: f64) -> Self {
        self.filtered(|r| r.total_reward >= min)
    }

    /// Episodes that took at most `max` steps.
    pub fn filter_by_steps(&self, max: usize) -> Self {
        self.filtered(|r| r.step_count <= max)
    }

    pub fn summary(&self, include_individual: bool) -> ResultSummary {
        ResultSummary {
            total_episodes: self.total_episodes(),
            successful_episodes: self.successful_episodes(),
            failed_episodes: self.failed_episodes(),
            success_rate: self.success_rate(),
            success_percentage: self.success_percentage(),
            total_reward: self.total_reward(),
            average_reward: self.average_reward().ok(),
            min_reward: self.min_reward().ok(),
            max_reward: self.max_reward().ok(),
            total_steps: self.total_steps(),
            average_steps: self.average_steps().ok(),
            reward_stddev: self.reward_stddev(),
            steps_stddev: self.steps_stddev(),
            episodes: include_individual.then(|| self.results.clone()),
        }
    }

    /// One header row then one row per episode. Step records are not part
    /// of the tabular form.
    pub fn to_csv(&self) -> String {
        let mut out = CSV_COLUMNS.join(",");
        out.push('\n');
        for r in &self.results {
            out.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                r.episode_number,
                r.total_reward,
                r.step_count,
                r.terminated,
                r.truncated,
                r.success,
                csv_field(r.error.as_deref().unwrap_or_default()),
            ));
        }
        out
    }

    /// `{"summary": {...}, "episodes": [...]}` with per-step detail when it
    /// was recorded.
    pub fn to_json(&self) -> Result<String, ResultsError> {
        let export = Export {
            summary: self.summary(false),
            episodes: &self.results,
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<(), ResultsError> {
        write_file(path.as_ref(), &self.to_csv())
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ResultsError> {
        write_file(path.as_ref(), &self.to_json()?)
    }

    fn rewards(&self) -> impl Iterator<Item = f64> + '_ {
        self.results.iter().map(|r| r.total_reward)
    }

    fn step_counts(&self) -> impl Iterator<Item = f64> + '_ {
        self.results.iter().map(|r| r.step_count as f64)
    }

    fn filtered(&self, keep: impl Fn(&EpisodeResult) -> bool) -> Self {
        Self::new(self.results.iter().filter(|r| keep(r)).cloned().collect())
    }
}

impl From<Vec<EpisodeResult>> for EpisodeResults {
    fn from(results: Vec<EpisodeResult>) -> Self {
        Self::new(results)
    }
}

impl FromIterator<EpisodeResult> for EpisodeResults {
    fn from_iter<I: IntoIterator<Item = EpisodeResult>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for EpisodeResults {
    type Item = EpisodeResult;
    type IntoIter = std::vec::IntoIter<EpisodeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a EpisodeResults {
    type Item = &'a EpisodeResult;
    type IntoIter = std::slice::Iter<'a, EpisodeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Result<f64, ResultsError> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return Err(ResultsError::EmptyResultSet);
    }
    Ok(sum / count as f64)
}

fn sample_stddev(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    variance.sqrt()
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), ResultsError> {
    fs::write(path, contents).map_err(|source| ResultsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn episode(number: usize, reward: f64, steps: usize, success: bool) -> EpisodeResult {
        EpisodeResult {
            total_reward: reward,
            step_count: steps,
            terminated: success,
            success,
            ..EpisodeResult::started(number)
        }
    }

    fn sample() -> EpisodeResults {
        EpisodeResults::new(vec![
            episode(1, 10.0, 10, true),
            episode(2, 2.0, 30, false),
            episode(3, 6.0, 20, true),
        ])
    }

    #[test]
    fn statistics() {
        let results = sample();
        assert_eq!(results.total_episodes(), 3);
        assert_eq!(results.successful_episodes(), 2);
        assert_eq!(results.failed_episodes(), 1);
        assert!((results.success_percentage() - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(results.total_reward(), 18.0);
        assert_eq!(results.average_reward().unwrap(), 6.0);
        assert_eq!(results.average_steps().unwrap(), 20.0);
        assert_eq!(results.min_reward().unwrap(), 2.0);
        assert_eq!(results.max_reward().unwrap(), 10.0);
        assert_eq!(results.reward_stddev(), 4.0);
        assert_eq!(results.steps_stddev(), 10.0);
    }

    #[test]
    fn empty_means_are_errors() {
        let results = EpisodeResults::default();
        assert!(matches!(results.average_reward(), Err(ResultsError::EmptyResultSet)));
        assert!(matches!(results.average_steps(), Err(ResultsError::EmptyResultSet)));
        assert!(matches!(results.min_reward(), Err(ResultsError::EmptyResultSet)));
        assert_eq!(results.success_percentage(), 0.0);
        assert_eq!(results.reward_stddev(), 0.0);

        let summary = results.summary(false);
        assert_eq!(summary.average_reward, None);
        assert_eq!(summary.total_episodes, 0);
    }

    #[test]
    fn single_episode_has_zero_spread() {
        let results = EpisodeResults::new(vec![episode(1, 3.0, 4, true)]);
        assert_eq!(results.reward_stddev(), 0.0);
        assert_eq!(results.steps_stddev(), 0.0);
    }

    #[test]
    fn filters_do_not_mutate() {
        let results = sample();
        let successes = results.filter_by_success(true);
        assert_eq!(
            successes.iter().map(|r| r.episode_number).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(results.filter_by_success(false).len(), 1);
        assert_eq!(results.filter_by_reward(6.0).len(), 2);
        assert_eq!(results.filter_by_steps(20).len(), 2);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn csv_has_one_row_per_episode() {
        let mut results = sample();
        results.push(EpisodeResult {
            error: Some("step failed: \"boom\", twice".into()),
            ..EpisodeResult::started(4)
        });
        let csv = results.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "episode_number,total_reward,step_count,terminated,truncated,success,error"
        );
        assert_eq!(lines[1], "1,10,10,true,false,true,");
        assert_eq!(lines[4], "4,0,0,false,false,false,\"step failed: \"\"boom\"\", twice\"");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn json_export_carries_summary_and_steps() {
        let mut first = episode(1, 1.0, 1, true);
        first.steps.push(StepRecord {
            step: 1,
            action: json!(0),
            observation: json!([1.0]),
            reward: 1.0,
            terminated: true,
            truncated: false,
            info: Info::new(),
        });
        let results = EpisodeResults::new(vec![first.clone()]);

        let exported: Value = serde_json::from_str(&results.to_json().unwrap()).unwrap();
        assert_eq!(exported["summary"]["total_episodes"], json!(1));
        assert_eq!(exported["summary"]["average_reward"], json!(1.0));
        assert_eq!(exported["episodes"][0]["steps"][0]["action"], json!(0));

        let episodes: Vec<EpisodeResult> =
            serde_json::from_value(exported["episodes"].clone()).unwrap();
        assert_eq!(episodes, vec![first]);
    }

    #[test]
    fn non_finite_rewards_survive_json_export() {
        let mut diverged = episode(1, f64::NEG_INFINITY, 2, false);
        diverged.steps.push(StepRecord {
            step: 1,
            action: json!(1),
            observation: json!([0.0]),
            reward: f64::NAN,
            terminated: false,
            truncated: false,
            info: Info::new(),
        });
        let results = EpisodeResults::new(vec![diverged, episode(2, 3.0, 1, true)]);

        let exported: Value = serde_json::from_str(&results.to_json().unwrap()).unwrap();
        assert_eq!(exported["episodes"][0]["total_reward"], json!("-Infinity"));
        assert_eq!(exported["episodes"][0]["steps"][0]["reward"], json!("NaN"));
        assert_eq!(exported["summary"]["min_reward"], json!("-Infinity"));
        assert_eq!(exported["summary"]["max_reward"], json!(3.0));

        let episodes: Vec<EpisodeResult> =
            serde_json::from_value(exported["episodes"].clone()).unwrap();
        assert_eq!(episodes[0].total_reward, f64::NEG_INFINITY);
        assert!(episodes[0].steps[0].reward.is_nan());
        assert_eq!(episodes[1], results.as_slice()[1]);
    }

    #[test]
    fn summary_can_include_episodes() {
        let summary = sample().summary(true);
        assert_eq!(summary.episodes.as_ref().map(Vec::len), Some(3));
        assert!(sample().summary(false).episodes.is_none());
    }

    #[test]
    fn files_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let results = sample();

        let csv_path = dir.path().join("results.csv");
        results.save_csv(&csv_path).unwrap();
        assert_eq!(fs::read_to_string(&csv_path).unwrap(), results.to_csv());

        let json_path = dir.path().join("results.json");
        results.save_json(&json_path).unwrap();
        let parsed: Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed["episodes"].as_array().map(Vec::len), Some(3));

        let err = results.save_csv(dir.path().join("missing/results.csv")).unwrap_err();
        assert!(matches!(err, ResultsError::Io { .. }));
    }
}

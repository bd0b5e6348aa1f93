//! Heuristic phase classification
//!
//! Maps raw subprocess output lines onto coarse progress phases by
//! case-insensitive substring matching against an operation-kind-specific
//! vocabulary. Progress is an estimate: a fixed step per classified line,
//! capped at 90 until the session observes the terminal exit, which jumps
//! it to 100. Unrecognized lines are skipped, never fatal.

use crate::models::operation::{OperationKind, Phase};

/// Progress step added per classified line
const PROGRESS_STEP: u8 = 2;

/// Progress ceiling until the terminal event
const PROGRESS_CAP: u8 = 90;

/// Line classification seam, swappable for tools that emit structured
/// progress natively.
pub trait LineClassifier: Send {
    /// Classify one output line; `None` skips the line
    fn classify(&mut self, line: &str) -> Option<(Phase, u8)>;

    /// The most recent line classified as an error, if any
    fn last_error(&self) -> Option<&str>;
}

struct Needle {
    text: &'static str,
    phase: Phase,
}

const fn needle(text: &'static str, phase: Phase) -> Needle {
    Needle { text, phase }
}

/// Package-manager output vocabulary. Error needles are checked first so a
/// line like "Error downloading ..." lands on the error phase.
const PACKAGE_VOCABULARY: &[Needle] = &[
    needle("e: ", Phase::Error),
    needle("err:", Phase::Error),
    needle("error", Phase::Error),
    needle("failed", Phase::Error),
    needle("unable to", Phase::Error),
    needle("reading package lists", Phase::Checking),
    needle("building dependency tree", Phase::Checking),
    needle("reading state information", Phase::Checking),
    needle("resolving dependencies", Phase::Checking),
    needle("calculating upgrade", Phase::Checking),
    needle("get:", Phase::Downloading),
    needle("downloading", Phase::Downloading),
    needle("retrieving", Phase::Downloading),
    needle("fetched", Phase::Downloading),
    needle("preparing to unpack", Phase::Installing),
    needle("unpacking", Phase::Installing),
    needle("setting up", Phase::Installing),
    needle("installing", Phase::Installing),
    needle("upgrading", Phase::Installing),
    needle("verifying", Phase::Verifying),
    needle("processing triggers", Phase::Verifying),
    needle("removing", Phase::Cleaning),
    needle("purging", Phase::Cleaning),
    needle("autoremoving", Phase::Cleaning),
    needle("cleaning", Phase::Cleaning),
    needle("reading database", Phase::Caching),
    needle("updating cache", Phase::Caching),
];

/// Compose output vocabulary
const COMPOSE_VOCABULARY: &[Needle] = &[
    needle("error", Phase::Error),
    needle("failed", Phase::Error),
    needle("no such", Phase::Error),
    needle("pulling", Phase::Downloading),
    needle("pull complete", Phase::Downloading),
    needle("downloading", Phase::Downloading),
    needle("downloaded", Phase::Downloading),
    needle("extracting", Phase::Downloading),
    needle("building", Phase::Installing),
    needle("creating", Phase::Installing),
    needle("created", Phase::Installing),
    needle("recreating", Phase::Installing),
    needle("starting", Phase::Installing),
    needle("started", Phase::Installing),
    needle("waiting", Phase::Verifying),
    needle("healthy", Phase::Verifying),
    needle("running", Phase::Verifying),
    needle("stopping", Phase::Cleaning),
    needle("stopped", Phase::Cleaning),
    needle("removing", Phase::Cleaning),
    needle("removed", Phase::Cleaning),
];

/// Vocabulary-driven classifier with a monotonic progress estimate
pub struct HeuristicClassifier {
    vocabulary: &'static [Needle],
    progress: u8,
    last_error: Option<String>,
}

impl HeuristicClassifier {
    /// Create a classifier for the given operation kind
    pub fn for_kind(kind: OperationKind) -> Self {
        let vocabulary = if kind.is_stack() {
            COMPOSE_VOCABULARY
        } else {
            PACKAGE_VOCABULARY
        };
        Self {
            vocabulary,
            progress: 0,
            last_error: None,
        }
    }
}

impl LineClassifier for HeuristicClassifier {
    fn classify(&mut self, line: &str) -> Option<(Phase, u8)> {
        let lowered = line.to_lowercase();

        let phase = self
            .vocabulary
            .iter()
            .find(|n| lowered.contains(n.text))
            .map(|n| n.phase)?;

        if phase == Phase::Error {
            self.last_error = Some(line.trim().to_string());
        }

        self.progress = (self.progress + PROGRESS_STEP).min(PROGRESS_CAP);
        Some((phase, self.progress))
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_apt_phases_in_order() {
        let mut classifier = HeuristicClassifier::for_kind(OperationKind::Install);

        let (phase, _) = classifier.classify("Get:1 http://deb.debian.org nginx").unwrap();
        assert_eq!(phase, Phase::Downloading);

        let (phase, _) = classifier.classify("Unpacking nginx (1.22.1) ...").unwrap();
        assert_eq!(phase, Phase::Installing);

        let (phase, _) = classifier.classify("Setting up nginx (1.22.1) ...").unwrap();
        assert_eq!(phase, Phase::Installing);
    }

    #[test]
    fn progress_is_monotonic_and_capped() {
        let mut classifier = HeuristicClassifier::for_kind(OperationKind::Update);

        let mut last = 0;
        for _ in 0..100 {
            let (_, progress) = classifier.classify("Unpacking something").unwrap();
            assert!(progress >= last);
            assert!(progress <= 90);
            last = progress;
        }
        assert_eq!(last, 90);
    }

    #[test]
    fn unrecognized_lines_are_skipped() {
        let mut classifier = HeuristicClassifier::for_kind(OperationKind::Install);
        assert!(classifier.classify("(lorem ipsum noise line)").is_none());
    }

    #[test]
    fn error_lines_are_retained() {
        let mut classifier = HeuristicClassifier::for_kind(OperationKind::Install);

        let (phase, _) = classifier
            .classify("E: Unable to locate package doesnotexist")
            .unwrap();
        assert_eq!(phase, Phase::Error);
        assert_eq!(
            classifier.last_error(),
            Some("E: Unable to locate package doesnotexist")
        );
    }

    #[test]
    fn stack_kinds_use_the_compose_vocabulary() {
        let mut classifier = HeuristicClassifier::for_kind(OperationKind::StackDeploy);

        let (phase, _) = classifier.classify("Pulling nginx (nginx:latest)...").unwrap();
        assert_eq!(phase, Phase::Downloading);

        let (phase, _) = classifier.classify("Creating media_nginx_1 ... done").unwrap();
        assert_eq!(phase, Phase::Installing);

        let (phase, _) = classifier.classify("Stopping media_nginx_1").unwrap();
        assert_eq!(phase, Phase::Cleaning);
    }
}

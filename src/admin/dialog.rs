//! The multi-step "add feed" dialog.
//!
//! A pure state machine: the console feeds it one answer at a time and acts
//! on the returned [`DialogEvent`].  The only asynchronous step is the
//! repository check, which the console performs and reports back through
//! [`RegistrationDialog::repo_checked`].
//!
//! ```text
//! Key ─► Title ─► Link ─► Repo ─► (checking) ─► Assets ─► Done(FeedDraft)
//!                          ▲           │ failed
//!                          └───────────┘
//! ```

use std::collections::HashSet;

use super::FeedDraft;
use crate::feed;
use crate::filter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Key,
    Title,
    Link,
    Repo,
    CheckingRepo,
    Assets,
}

/// What the console should do after an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogEvent {
    /// Show the next prompt.
    Next,
    /// The answer was rejected; show the message and ask again.
    Retry(String),
    /// Validate this repository, then call `repo_checked`.
    CheckRepo(String),
    /// All answers collected.
    Done(FeedDraft),
}

#[derive(Debug, Clone)]
pub struct RegistrationDialog {
    step: Step,
    draft: FeedDraft,
    known_keys: HashSet<String>,
    assets: Vec<String>,
}

impl RegistrationDialog {
    /// `known_keys` are rejected at the first step.
    pub fn new(known_keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            step: Step::Key,
            draft: FeedDraft::default(),
            known_keys: known_keys.into_iter().collect(),
            assets: Vec::new(),
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Asset names of the validated repository's latest release.
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn prompt(&self) -> &'static str {
        match self.step {
            Step::Key => "Feed key (letters, digits, underscore):",
            Step::Title => "Display title:",
            Step::Link => "Project link (may be empty):",
            Step::Repo => "GitHub repository (owner/name):",
            Step::CheckingRepo => "Checking repository…",
            Step::Assets => "Asset numbers and/or glob patterns (e.g. `1 3` or `*.apk`):",
        }
    }

    pub fn answer(&mut self, input: &str) -> DialogEvent {
        let input = input.trim();
        match self.step {
            Step::Key => {
                if !feed::is_valid_key(input) {
                    return DialogEvent::Retry(format!("{input:?} is not a valid key"));
                }
                if self.known_keys.contains(input) {
                    return DialogEvent::Retry(format!("key {input:?} is already taken"));
                }
                self.draft.key = input.to_string();
                self.step = Step::Title;
                DialogEvent::Next
            }
            Step::Title => {
                if input.is_empty() {
                    return DialogEvent::Retry("title must not be empty".into());
                }
                self.draft.title = input.to_string();
                self.step = Step::Link;
                DialogEvent::Next
            }
            Step::Link => {
                self.draft.link = input.to_string();
                self.step = Step::Repo;
                DialogEvent::Next
            }
            Step::Repo => {
                if !feed::is_valid_repo(input) {
                    return DialogEvent::Retry(format!("{input:?} is not owner/name"));
                }
                self.draft.repo = input.to_string();
                self.step = Step::CheckingRepo;
                DialogEvent::CheckRepo(input.to_string())
            }
            Step::CheckingRepo => DialogEvent::Retry("still checking the repository".into()),
            Step::Assets => match self.select_assets(input) {
                Ok(filters) => {
                    let mut draft = self.draft.clone();
                    draft.asset_filters = filters;
                    DialogEvent::Done(draft)
                }
                Err(message) => DialogEvent::Retry(message),
            },
        }
    }

    /// Result of the repository check requested by [`DialogEvent::CheckRepo`].
    pub fn repo_checked(&mut self, result: Result<Vec<String>, String>) -> DialogEvent {
        if self.step != Step::CheckingRepo {
            return DialogEvent::Next;
        }
        match result {
            Ok(assets) => {
                self.assets = assets;
                self.step = Step::Assets;
                DialogEvent::Next
            }
            Err(message) => {
                self.step = Step::Repo;
                DialogEvent::Retry(message)
            }
        }
    }

    /// Turn `1 3 *.apk` into patterns: numbers pick listed assets verbatim,
    /// anything else must be a valid glob.
    fn select_assets(&self, input: &str) -> Result<Vec<String>, String> {
        let mut patterns = Vec::new();
        for token in input.split(|c: char| c == ',' || c.is_whitespace()) {
            if token.is_empty() {
                continue;
            }
            match token.parse::<usize>() {
                Ok(n) => {
                    let name = n
                        .checked_sub(1)
                        .and_then(|i| self.assets.get(i))
                        .ok_or_else(|| format!("no asset number {n}"))?;
                    patterns.push(filter::literal_pattern(name));
                }
                Err(_) => patterns.push(token.to_string()),
            }
        }
        if patterns.is_empty() {
            return Err("select at least one asset or pattern".into());
        }
        let mut patterns = filter::validate_patterns(&patterns).map_err(|e| e.to_string())?;
        let mut seen = HashSet::new();
        patterns.retain(|p| seen.insert(p.clone()));
        Ok(patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn through_repo(dialog: &mut RegistrationDialog) {
        assert_eq!(dialog.answer("pif"), DialogEvent::Next);
        assert_eq!(dialog.answer("PlayIntegrityFix"), DialogEvent::Next);
        assert_eq!(dialog.answer(""), DialogEvent::Next);
        assert_eq!(
            dialog.answer("chiteroman/PlayIntegrityFix"),
            DialogEvent::CheckRepo("chiteroman/PlayIntegrityFix".into())
        );
    }

    #[test]
    fn full_walkthrough_yields_draft() {
        let mut dialog = RegistrationDialog::new(Vec::new());
        through_repo(&mut dialog);
        assert_eq!(dialog.step(), Step::CheckingRepo);

        dialog.repo_checked(Ok(vec!["PIF-v1.zip".into(), "notes[1].txt".into()]));
        assert_eq!(dialog.step(), Step::Assets);

        match dialog.answer("2, *.zip 2") {
            DialogEvent::Done(draft) => {
                assert_eq!(draft.key, "pif");
                assert_eq!(draft.title, "PlayIntegrityFix");
                assert_eq!(draft.link, "");
                assert_eq!(draft.repo, "chiteroman/PlayIntegrityFix");
                assert_eq!(draft.asset_filters, vec![filter::literal_pattern("notes[1].txt"), "*.zip".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_or_taken_keys() {
        let mut dialog = RegistrationDialog::new(vec!["pif".to_string()]);
        assert!(matches!(dialog.answer("p i f"), DialogEvent::Retry(_)));
        assert!(matches!(dialog.answer("pif"), DialogEvent::Retry(_)));
        assert_eq!(dialog.step(), Step::Key);
        assert_eq!(dialog.answer("pif2"), DialogEvent::Next);
    }

    #[test]
    fn failed_repo_check_returns_to_repo_step() {
        let mut dialog = RegistrationDialog::new(Vec::new());
        through_repo(&mut dialog);

        assert!(matches!(dialog.repo_checked(Err("not found".into())), DialogEvent::Retry(_)));
        assert_eq!(dialog.step(), Step::Repo);
        assert!(matches!(dialog.answer("bad"), DialogEvent::Retry(_)));
    }

    #[test]
    fn answers_ignored_while_checking() {
        let mut dialog = RegistrationDialog::new(Vec::new());
        through_repo(&mut dialog);
        assert!(matches!(dialog.answer("1"), DialogEvent::Retry(_)));
        assert_eq!(dialog.step(), Step::CheckingRepo);
    }

    #[test]
    fn asset_selection_errors() {
        let mut dialog = RegistrationDialog::new(Vec::new());
        through_repo(&mut dialog);
        dialog.repo_checked(Ok(vec!["a.apk".into()]));

        assert!(matches!(dialog.answer(""), DialogEvent::Retry(_)));
        assert!(matches!(dialog.answer("0"), DialogEvent::Retry(_)));
        assert!(matches!(dialog.answer("2"), DialogEvent::Retry(_)));
        assert!(matches!(dialog.answer("[bad"), DialogEvent::Retry(_)));
        assert!(matches!(dialog.answer("1"), DialogEvent::Done(_)));
    }

    #[test]
    fn stale_repo_result_is_ignored() {
        let mut dialog = RegistrationDialog::new(Vec::new());
        assert_eq!(dialog.repo_checked(Ok(vec![])), DialogEvent::Next);
        assert_eq!(dialog.step(), Step::Key);
    }
}

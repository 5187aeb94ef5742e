//! Replay planning - pure functions for turning a commit range into a plan
//!
//! This module contains the pure, testable logic for building replay plans.
//! No I/O happens here - all data is passed in, making it easy to unit test.

use crate::error::{Error, Result};
use crate::types::Commit;

/// Autosquash directive kind parsed from a commit subject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectiveKind {
    Fixup,
    Squash,
}

/// A single step in the replay plan
///
/// Steps are emitted in replay order: every `Pick` is followed immediately by
/// the directives folded into it, the reordering `git rebase --autosquash`
/// performs. The replay engine's last-pick accumulator is therefore always
/// the directive's anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    /// Replay this commit as its own commit
    Pick {
        /// Source commit to replay
        source: Commit,
        /// Message for the new commit, with any squash bodies already folded
        message: String,
    },
    /// Fold this commit's tree change into the anchor pick, keeping the
    /// anchor's message
    Fixup {
        /// Source commit to fold
        source: Commit,
        /// Index of the anchor `Pick` in the plan
        anchor: usize,
    },
    /// Fold this commit's tree change into the anchor pick, whose folded
    /// message already carries this commit's body
    Squash {
        /// Source commit to fold
        source: Commit,
        /// Index of the anchor `Pick` in the plan
        anchor: usize,
    },
}

impl PlanStep {
    /// The source commit this step replays
    #[must_use]
    pub fn source(&self) -> &Commit {
        match self {
            Self::Pick { source, .. }
            | Self::Fixup { source, .. }
            | Self::Squash { source, .. } => source,
        }
    }
}

impl std::fmt::Display for PlanStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (verb, source) = match self {
            Self::Pick { source, .. } => ("pick", source),
            Self::Fixup { source, .. } => ("fixup", source),
            Self::Squash { source, .. } => ("squash", source),
        };
        let sha = source.id.as_str();
        write!(f, "{verb} {} {}", &sha[..sha.len().min(7)], source.subject())
    }
}

/// Replay plan - the functional core output
///
/// A pure data structure describing how the commit range will be replayed.
/// Created by [`plan_replay`] (pure) and executed by the replay engine
/// (effectful).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebasePlan {
    /// Ordered steps to perform
    pub steps: Vec<PlanStep>,
}

impl RebasePlan {
    /// Whether the plan has no steps at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps in the plan
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Number of commits the rewritten branch will carry
    #[must_use]
    pub fn pick_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, PlanStep::Pick { .. }))
            .count()
    }
}

/// A pick plus the directives folded into it, accumulated during planning
struct Group {
    pick: Commit,
    message: String,
    trailing: Vec<(Commit, DirectiveKind)>,
}

/// Parse an autosquash directive from a commit subject
///
/// Recognizes `fixup! ` and `squash! ` prefixes with a non-empty suffix;
/// anything else is an ordinary commit.
fn parse_directive(subject: &str) -> Option<(DirectiveKind, &str)> {
    if let Some(target) = subject.strip_prefix("fixup! ") {
        if !target.is_empty() {
            return Some((DirectiveKind::Fixup, target));
        }
    }
    if let Some(target) = subject.strip_prefix("squash! ") {
        if !target.is_empty() {
            return Some((DirectiveKind::Squash, target));
        }
    }
    None
}

/// Message body after the subject line, with leading blank lines stripped
fn body_after_subject(message: &str) -> &str {
    match message.split_once('\n') {
        Some((_, rest)) => rest.trim_start_matches('\n'),
        None => "",
    }
}

/// Create a replay plan from the commit range (PURE - no I/O)
///
/// Ordinary commits become `Pick` steps in input order. A `fixup!`/`squash!`
/// commit is moved to sit directly behind its anchor: the most recent prior
/// commit whose subject equals the directive's target, chasing chains of
/// directives (`fixup! fixup! x`) back to their pick. Squash bodies are
/// folded into the anchor's message left-to-right, separated by a blank line.
///
/// A directive with no anchor fails with
/// [`Error::AutosquashUnresolved`]. An input without directives yields an
/// all-pick plan identical in length and order to the input.
pub fn plan_replay(commits: &[Commit]) -> Result<RebasePlan> {
    let mut groups: Vec<Group> = Vec::new();
    // Subject of every commit seen so far, with the group it landed in,
    // searched backward for "most recent prior" anchor resolution
    let mut seen_subjects: Vec<(String, usize)> = Vec::new();

    for commit in commits {
        let subject = commit.subject().to_string();
        match parse_directive(&subject) {
            Some((kind, target)) => {
                let Some(&(_, group_index)) = seen_subjects
                    .iter()
                    .rev()
                    .find(|(seen, _)| seen == target)
                else {
                    return Err(Error::AutosquashUnresolved { subject });
                };

                let group = &mut groups[group_index];
                if kind == DirectiveKind::Squash {
                    let body = body_after_subject(&commit.message);
                    if !body.is_empty() {
                        group.message = format!("{}\n\n{body}", group.message);
                    }
                }
                group.trailing.push((commit.clone(), kind));
                seen_subjects.push((subject, group_index));
            }
            None => {
                groups.push(Group {
                    pick: commit.clone(),
                    message: commit.message.clone(),
                    trailing: Vec::new(),
                });
                seen_subjects.push((subject, groups.len() - 1));
            }
        }
    }

    // Flatten: each pick followed by the directives folded into it
    let mut steps = Vec::with_capacity(commits.len());
    for group in groups {
        let anchor = steps.len();
        steps.push(PlanStep::Pick {
            source: group.pick,
            message: group.message,
        });
        for (source, kind) in group.trailing {
            steps.push(match kind {
                DirectiveKind::Fixup => PlanStep::Fixup { source, anchor },
                DirectiveKind::Squash => PlanStep::Squash { source, anchor },
            });
        }
    }

    Ok(RebasePlan { steps })
}

/// Whether any commit in the range carries an autosquash directive (PURE)
///
/// This is the read-only predicate behind
/// [`needs_autosquashing`](crate::rebase::needs_autosquashing): `true` iff
/// replaying the range with [`plan_replay`] would fold anything.
#[must_use]
pub fn contains_autosquash_directives(commits: &[Commit]) -> bool {
    commits
        .iter()
        .any(|c| parse_directive(c.subject()).is_some())
}

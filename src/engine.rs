//! Projection engine.
//!
//! Groups sessions into lineages by [`TopicKey`], places every lineage in one
//! branch of the review policy and turns that branch into a dated
//! [`Projection`]. Everything here is a pure function of its arguments: the
//! caller passes in the sessions, the overrides and the current day.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use tracing::{debug, warn};

use crate::models::{
    parse_date, Case, Overrides, Projection, Session, SessionRecord, Tier, TopicKey, Urgency,
};

const STRUGGLING_BELOW: f64 = 70.0;
const CONSOLIDATING_UP_TO: f64 = 85.0;
const PROMOTION_ABOVE: f64 = 85.0;
const MASTERY_ABOVE: f64 = 90.0;
const DROP_BELOW: f64 = 80.0;

/// Where a lineage stands after its latest session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Standing {
    pub initial_accuracy: f64,
    pub latest_accuracy: f64,
    pub ordinal: usize,
}

impl Standing {
    fn struggling(&self) -> bool {
        self.initial_accuracy < STRUGGLING_BELOW
    }

    fn consolidating(&self) -> bool {
        (STRUGGLING_BELOW..=CONSOLIDATING_UP_TO).contains(&self.initial_accuracy)
    }

    fn mastered(&self) -> bool {
        self.initial_accuracy > CONSOLIDATING_UP_TO
    }
}

pub struct Rule {
    pub case: Case,
    pub days_from_latest: i64,
    pub urgency: Urgency,
    pub action: &'static str,
    applies: fn(&Standing) -> bool,
}

// Evaluated top to bottom; the first rule that applies wins.
static RULES: [Rule; 13] = [
    Rule {
        case: Case::Demoted,
        days_from_latest: 1,
        urgency: Urgency::High,
        action: "Demoted: performance below 70%. Restart the Case A base.",
        applies: |s| s.ordinal > 1 && s.latest_accuracy < STRUGGLING_BELOW,
    },
    Rule {
        case: Case::Rescue,
        days_from_latest: 1,
        urgency: Urgency::High,
        action: "D+1: redo the missed questions. Work from the error notebook.",
        applies: |s| s.struggling() && s.ordinal == 1,
    },
    Rule {
        case: Case::StabilityTest,
        days_from_latest: 3,
        urgency: Urgency::Medium,
        action: "D+4: stability test.",
        applies: |s| s.struggling() && s.ordinal == 2 && s.latest_accuracy == 100.0,
    },
    Rule {
        case: Case::RepeatNextDay,
        days_from_latest: 1,
        urgency: Urgency::High,
        action: "Missed the D+1 target: repeat the errors from the last session.",
        applies: |s| s.struggling() && s.ordinal == 2,
    },
    Rule {
        case: Case::PromotedToC,
        days_from_latest: 15,
        urgency: Urgency::Low,
        action: "Promoted: review again in 15 days.",
        applies: |s| s.struggling() && s.ordinal == 3 && s.latest_accuracy > PROMOTION_ABOVE,
    },
    Rule {
        case: Case::PromotedToB,
        days_from_latest: 7,
        urgency: Urgency::Medium,
        action: "Reinforce: below 85%. Review again in 7 days.",
        applies: |s| s.struggling() && s.ordinal == 3,
    },
    Rule {
        case: Case::PermanentMaintenance,
        days_from_latest: 30,
        urgency: Urgency::Low,
        action: "Permanent maintenance.",
        applies: |s| s.struggling() && s.ordinal > 3,
    },
    Rule {
        case: Case::Polishing,
        days_from_latest: 7,
        urgency: Urgency::Medium,
        action: "D+7: mixed battery (objective + discursive).",
        applies: |s| s.consolidating() && s.ordinal == 1,
    },
    Rule {
        case: Case::ConsolidatedToC,
        days_from_latest: 30,
        urgency: Urgency::Low,
        action: "Mastery reached: next review in 30 days.",
        applies: |s| s.consolidating() && s.latest_accuracy > MASTERY_ABOVE,
    },
    Rule {
        case: Case::Fixation,
        days_from_latest: 14,
        urgency: Urgency::Medium,
        action: "Fixation: maintenance in 14 days.",
        applies: |s| s.consolidating(),
    },
    Rule {
        case: Case::DroppedToB,
        days_from_latest: 7,
        urgency: Urgency::Medium,
        action: "Dropped below 80%: back to the 7 day cycle.",
        applies: |s| s.mastered() && s.latest_accuracy < DROP_BELOW,
    },
    Rule {
        case: Case::Mastery,
        days_from_latest: 15,
        urgency: Urgency::Low,
        action: "D+15: quick topic mock exam.",
        applies: |s| s.mastered() && s.ordinal == 1,
    },
    Rule {
        case: Case::LongTermMaintenance,
        days_from_latest: 45,
        urgency: Urgency::Low,
        action: "D+45: long-term maintenance.",
        applies: |_| true,
    },
];

pub fn classify(standing: &Standing) -> &'static Rule {
    RULES
        .iter()
        .find(|rule| (rule.applies)(standing))
        .unwrap_or(&RULES[RULES.len() - 1])
}

/// Validates raw store rows and projects every lineage.
///
/// Rows without a usable timestamp or counts are skipped; they never abort the
/// computation for the remaining topics.
pub fn compute_projections(
    records: &[SessionRecord],
    overrides: &Overrides,
    today: NaiveDate,
) -> Vec<Projection> {
    let sessions = valid_sessions(records);
    project_sessions(&sessions, overrides, today)
}

pub fn valid_sessions(records: &[SessionRecord]) -> Vec<Session> {
    records
        .iter()
        .filter_map(|record| {
            let session = Session::from_record(record);
            if session.is_none() {
                debug!(
                    id = ?record.id,
                    subject = %record.subject,
                    topic = %record.topic,
                    "skipping malformed session row"
                );
            }
            session
        })
        .collect()
}

/// Sessions grouped by topic key, each group in timestamp order.
pub fn group_lineages(sessions: &[Session]) -> BTreeMap<TopicKey, Vec<&Session>> {
    let mut groups: BTreeMap<TopicKey, Vec<&Session>> = BTreeMap::new();
    for session in sessions {
        groups.entry(session.key()).or_default().push(session);
    }
    for lineage in groups.values_mut() {
        lineage.sort_by_key(|s| s.timestamp);
    }
    groups
}

pub fn project_sessions(
    sessions: &[Session],
    overrides: &Overrides,
    today: NaiveDate,
) -> Vec<Projection> {
    let mut projections: Vec<Projection> = group_lineages(sessions)
        .into_iter()
        .filter_map(|(key, lineage)| project_lineage(key, &lineage, overrides, today))
        .collect();

    projections.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| a.subject.cmp(&b.subject))
            .then_with(|| a.key.topic().cmp(b.key.topic()))
    });
    projections
}

fn project_lineage(
    key: TopicKey,
    lineage: &[&Session],
    overrides: &Overrides,
    today: NaiveDate,
) -> Option<Projection> {
    let initial = lineage.first()?;
    let latest = lineage.last()?;

    let standing = Standing {
        initial_accuracy: initial.accuracy(),
        latest_accuracy: latest.accuracy(),
        ordinal: lineage.len(),
    };
    let rule = classify(&standing);

    let base = latest.date.unwrap_or_else(|| {
        debug!(%key, "latest session has no readable date, scheduling from today");
        today
    });
    let days = rule.days_from_latest.max(1);
    let computed = base
        .checked_add_days(Days::new(days as u64))
        .unwrap_or(base);

    let override_key = key.override_key();
    let pinned = overrides.get(&override_key).and_then(|raw| {
        let date = parse_date(raw);
        if date.is_none() {
            warn!(key = %override_key, value = raw, "ignoring unreadable override date");
        }
        date
    });

    Some(Projection {
        due_date: pinned.unwrap_or(computed),
        subject: latest.subject.clone(),
        topic: latest.topic.clone(),
        action: rule.action.to_string(),
        case: rule.case,
        tier: Tier::from_accuracy(standing.initial_accuracy),
        urgency: rule.urgency,
        accuracy: standing.latest_accuracy,
        session_ordinal: standing.ordinal,
        days_from_latest: days,
        overridden: pinned.is_some(),
        override_key,
        wrong_questions: latest.wrong_questions.clone(),
        key,
    })
}

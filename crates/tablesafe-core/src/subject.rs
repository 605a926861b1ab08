//! Subjects: the rateable venues that feedback and reports are about.
//!
//! A subject carries denormalized copies of text from other stores plus
//! aggregates derived from its own sample lists. Every derived field is
//! recomputed from its source list on write.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, aggregate};

/// Lowest accepted rating value.
pub const RATING_MIN: f64 = 1.0;
/// Highest accepted rating value.
pub const RATING_MAX: f64 = 5.0;

/// Diet filter value that disables filtering.
pub const NO_DIET_FILTER: &str = "none";

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:     Uuid,
  pub name:           String,
  pub address:        String,
  pub category:       String,
  pub diet_tags:      BTreeSet<String>,
  pub ratings:        Ratings,
  pub incident_count: u64,
  /// Comments copied from feedback entries, in submission order.
  pub feedback_text:  Vec<TextEntry>,
  /// Descriptions copied from reports bound to this subject.
  pub incident_text:  Vec<TextEntry>,
}

impl Subject {
  pub fn from_new(input: NewSubject) -> Self {
    Self {
      subject_id:     Uuid::new_v4(),
      name:           input.name,
      address:        input.address,
      category:       input.category,
      diet_tags:      input.diet_tags,
      ratings:        Ratings::default(),
      incident_count: 0,
      feedback_text:  Vec::new(),
      incident_text:  Vec::new(),
    }
  }

  /// Overwrite descriptive fields. Aggregates and denormalized text stay.
  pub fn apply(&mut self, update: SubjectUpdate) {
    self.name = update.name;
    self.address = update.address;
    self.category = update.category;
    self.diet_tags = update.diet_tags;
  }

  /// Append a feedback comment unless one from `source_id` is already
  /// present. Returns whether anything changed.
  pub fn push_feedback_text(&mut self, source_id: Uuid, text: String) -> bool {
    push_entry(&mut self.feedback_text, source_id, text)
  }

  /// Append an incident description unless one from `source_id` is already
  /// present, then recompute `incident_count` from the list.
  pub fn push_incident(&mut self, source_id: Uuid, text: String) -> bool {
    let added = push_entry(&mut self.incident_text, source_id, text);
    self.incident_count = aggregate::count(&self.incident_text);
    added
  }

  /// Whether the subject carries `tag`, compared in lowercase.
  pub fn has_diet_tag(&self, tag: &str) -> bool {
    let tag = tag.to_lowercase();
    self.diet_tags.iter().any(|t| t.to_lowercase() == tag)
  }
}

/// A piece of text copied from another store, tagged with the id of the
/// record it came from so the copy can be made exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntry {
  pub source_id: Uuid,
  pub text:      String,
}

fn push_entry(entries: &mut Vec<TextEntry>, source_id: Uuid, text: String) -> bool {
  if entries.iter().any(|e| e.source_id == source_id) {
    return false;
  }
  entries.push(TextEntry { source_id, text });
  true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubject {
  pub name:      String,
  pub address:   String,
  pub category:  String,
  #[serde(default)]
  pub diet_tags: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectUpdate {
  pub name:      String,
  pub address:   String,
  pub category:  String,
  pub diet_tags: BTreeSet<String>,
}

// ─── Ratings ─────────────────────────────────────────────────────────────────

/// One rated dimension: every submitted value plus their mean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingDimension {
  pub running_values: Vec<f64>,
  pub mean:           f64,
}

impl RatingDimension {
  fn push(&mut self, value: f64) {
    self.running_values.push(value);
    self.mean = aggregate::mean(&self.running_values);
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ratings {
  pub quality:       RatingDimension,
  pub safety:        RatingDimension,
  pub accessibility: RatingDimension,
}

impl Ratings {
  /// Append one sample to each dimension and recompute the means.
  ///
  /// The sample is validated first; nothing changes on error.
  pub fn push(&mut self, sample: RatingSample) -> Result<RatingMeans> {
    sample.validate()?;
    self.quality.push(sample.quality);
    self.safety.push(sample.safety);
    self.accessibility.push(sample.accessibility);
    Ok(self.means())
  }

  pub fn means(&self) -> RatingMeans {
    RatingMeans {
      quality:       self.quality.mean,
      safety:        self.safety.mean,
      accessibility: self.accessibility.mean,
    }
  }
}

/// One submission: a value per dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSample {
  pub quality:       f64,
  pub safety:        f64,
  pub accessibility: f64,
}

impl RatingSample {
  /// Reject any value outside `[RATING_MIN, RATING_MAX]`, including NaN.
  pub fn validate(&self) -> Result<()> {
    for (dimension, value) in [
      ("quality", self.quality),
      ("safety", self.safety),
      ("accessibility", self.accessibility),
    ] {
      if !(RATING_MIN..=RATING_MAX).contains(&value) {
        return Err(Error::InvalidRange { dimension, value });
      }
    }
    Ok(())
  }
}

/// The three means after a submission.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingMeans {
  pub quality:       f64,
  pub safety:        f64,
  pub accessibility: f64,
}

// ─── Filtering ───────────────────────────────────────────────────────────────

/// Diet-tag filter for [`SubjectStore::find_all`](crate::store::SubjectStore::find_all).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DietFilter(Option<String>);

impl DietFilter {
  /// Build a filter from caller input. `None`, the empty string and the
  /// exact sentinel `"none"` disable filtering. Any other value, including
  /// `"NONE"`, is a tag to look for.
  pub fn new(value: Option<&str>) -> Self {
    match value {
      None | Some("") | Some(NO_DIET_FILTER) => Self(None),
      Some(v) => Self(Some(v.to_owned())),
    }
  }

  pub fn all() -> Self { Self(None) }

  pub fn matches(&self, subject: &Subject) -> bool {
    match &self.0 {
      None => true,
      Some(tag) => subject.has_diet_tag(tag),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn subject(tags: &[&str]) -> Subject {
    Subject::from_new(NewSubject {
      name:      "Noodle Bar".into(),
      address:   "1 Main St".into(),
      category:  "thai".into(),
      diet_tags: tags.iter().map(|t| t.to_string()).collect(),
    })
  }

  #[test]
  fn validate_rejects_out_of_range_and_nan() {
    let ok = RatingSample { quality: 1.0, safety: 5.0, accessibility: 3.5 };
    assert!(ok.validate().is_ok());

    let high = RatingSample { quality: 6.0, safety: 3.0, accessibility: 3.0 };
    assert!(matches!(
      high.validate(),
      Err(Error::InvalidRange { dimension: "quality", .. })
    ));

    let low = RatingSample { quality: 3.0, safety: 3.0, accessibility: 0.5 };
    assert!(matches!(
      low.validate(),
      Err(Error::InvalidRange { dimension: "accessibility", .. })
    ));

    let nan = RatingSample { quality: 3.0, safety: f64::NAN, accessibility: 3.0 };
    assert!(nan.validate().is_err());
  }

  #[test]
  fn push_recomputes_means_from_full_sequence() {
    let mut ratings = Ratings::default();
    ratings
      .push(RatingSample { quality: 1.0, safety: 2.0, accessibility: 5.0 })
      .unwrap();
    let means = ratings
      .push(RatingSample { quality: 5.0, safety: 4.0, accessibility: 4.0 })
      .unwrap();

    assert_eq!(means.quality, 3.0);
    assert_eq!(means.safety, 3.0);
    assert_eq!(means.accessibility, 4.5);
    assert_eq!(ratings.quality.running_values, vec![1.0, 5.0]);
  }

  #[test]
  fn push_with_invalid_sample_changes_nothing() {
    let mut ratings = Ratings::default();
    ratings
      .push(RatingSample { quality: 4.0, safety: 4.0, accessibility: 4.0 })
      .unwrap();
    let before = ratings.clone();

    let err = ratings
      .push(RatingSample { quality: 6.0, safety: 3.0, accessibility: 3.0 })
      .unwrap_err();
    assert!(matches!(err, Error::InvalidRange { .. }));
    assert_eq!(ratings, before);
  }

  #[test]
  fn incident_count_follows_entries_and_ignores_repeats() {
    let mut s = subject(&[]);
    let report = Uuid::new_v4();
    assert!(s.push_incident(report, "leak".into()));
    assert!(!s.push_incident(report, "leak".into()));
    assert_eq!(s.incident_count, 1);
    assert!(s.push_incident(Uuid::new_v4(), "leak".into()));
    assert_eq!(s.incident_count, 2);
  }

  #[test]
  fn diet_filter_sentinel_and_case() {
    let vegan = subject(&["Vegan", "gluten"]);
    let plain = subject(&[]);

    assert!(DietFilter::new(None).matches(&plain));
    assert!(DietFilter::new(Some("")).matches(&plain));
    assert!(DietFilter::new(Some("none")).matches(&plain));
    assert!(!DietFilter::new(Some("NONE")).matches(&plain));
    assert!(!DietFilter::new(Some(" vegan")).matches(&vegan));
    assert!(DietFilter::new(Some("vegan")).matches(&vegan));
    assert!(DietFilter::new(Some("GLUTEN")).matches(&vegan));
    assert!(!DietFilter::new(Some("vegan")).matches(&plain));
    assert!(!DietFilter::new(Some("keto")).matches(&vegan));
  }

  #[test]
  fn diet_filter_lowercases_beyond_ascii() {
    let vegan = subject(&["Végétalien"]);
    assert!(DietFilter::new(Some("VÉGÉTALIEN")).matches(&vegan));
    assert!(DietFilter::new(Some("végétalien")).matches(&vegan));
  }
}

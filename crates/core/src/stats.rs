use serde::{Deserialize, Serialize};

use crate::model::ContentBucket;
use crate::tree::CourseTree;

/// Lesson counts per content bucket. Unlisted content types are in no bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentCounts {
    pub video: u32,
    pub reading: u32,
    pub quizzes: u32,
    pub assignments: u32,
}

impl ContentCounts {
    fn add(&mut self, bucket: ContentBucket) {
        let slot = match bucket {
            ContentBucket::Video => &mut self.video,
            ContentBucket::Reading => &mut self.reading,
            ContentBucket::Quiz => &mut self.quizzes,
            ContentBucket::Assignment => &mut self.assignments,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Summary statistics derived from a loaded [`CourseTree`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseStats {
    pub counts: ContentCounts,
    pub total_lessons: u32,
    pub completed_lessons: u32,
    /// Minutes, summed over chapter totals.
    pub total_duration: u32,
    /// 0.0..=100.0; 0 when the course has no lessons.
    pub percent_complete: f64,
}

impl CourseStats {
    #[must_use]
    pub fn from_tree(tree: &CourseTree) -> Self {
        let mut stats = Self::default();
        for chapter in tree.chapters() {
            stats.total_duration = stats.total_duration.saturating_add(chapter.total_duration);
            for node in &chapter.lessons {
                stats.total_lessons = stats.total_lessons.saturating_add(1);
                if node.is_completed {
                    stats.completed_lessons = stats.completed_lessons.saturating_add(1);
                }
                if let Some(bucket) = node.lesson.content_type().bucket() {
                    stats.counts.add(bucket);
                }
            }
        }
        stats.percent_complete = percent(stats.completed_lessons, stats.total_lessons);
        stats
    }

    /// Whole-number percentage for display.
    #[must_use]
    pub fn percent_rounded(&self) -> u8 {
        // Bounded to 0..=100 by construction.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = self.percent_complete.round().clamp(0.0, 100.0) as u8;
        value
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.total_lessons > 0 && self.completed_lessons == self.total_lessons
    }
}

fn percent(completed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(completed) * 100.0 / f64::from(total)
}

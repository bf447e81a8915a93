//! Test data builders for creating records

use mimic_rs::{Angles, Bookmark, CorrectionEntry, Frame, Record, Vec3};

/// Builder for records with a straight-line path along x
///
/// Frame `i` sits at `x = i`. Corrections must be attached in frame order.
pub struct RecordBuilder {
    name: String,
    end_time: i32,
    frames: Vec<Frame>,
    corrections: Vec<CorrectionEntry>,
    bookmarks: Vec<Bookmark>,
}

impl RecordBuilder {
    pub fn new(name: &str, frames: usize) -> Self {
        let frames = (0..frames)
            .map(|i| Frame {
                origin: Vec3::new(i as f32, 0.0, 0.0),
                actual_velocity: Vec3::new(1.0, 0.0, 0.0),
                seed: i as i32,
                ..Default::default()
            })
            .collect();
        Self {
            name: name.to_string(),
            end_time: 1_000,
            frames,
            corrections: Vec::new(),
            bookmarks: Vec::new(),
        }
    }

    pub fn end_time(mut self, end_time: i32) -> Self {
        self.end_time = end_time;
        self
    }

    pub fn correct(mut self, frame: usize, entry: CorrectionEntry) -> Self {
        self.frames[frame].correction = entry.flags();
        self.corrections.push(entry);
        self
    }

    /// Bookmark `frame`, which must already carry a correction
    pub fn bookmark(mut self, frame: usize, name: &str) -> Self {
        let flagged = self.frames[..=frame]
            .iter()
            .filter(|f| f.correction.has_correction())
            .count();
        self.bookmarks.push(Bookmark {
            frame: frame as u32,
            correction_index: flagged as u32 - 1,
            name: name.to_string(),
        });
        self
    }

    pub fn weapon(mut self, frame: usize, identifier: &str) -> Self {
        self.frames[frame].new_weapon = Some(identifier.to_string());
        self
    }

    pub fn build(self) -> Record {
        Record::new(
            self.name,
            self.end_time,
            Vec3::new(-10.0, 0.0, 0.0),
            Angles::new(5.0, 90.0, 0.0),
            self.frames,
            self.corrections,
            self.bookmarks,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = RecordBuilder::new("test", 4)
            .correct(1, CorrectionEntry::origin_only(Vec3::ZERO))
            .correct(3, CorrectionEntry::full(Vec3::ZERO, Angles::default(), Vec3::ZERO))
            .bookmark(3, "end")
            .build();

        assert_eq!(record.frame_count(), 4);
        assert_eq!(record.flagged_frame_count(), 2);
        assert_eq!(record.header.bookmarks[0].correction_index, 1);
    }
}

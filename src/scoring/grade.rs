/// Converts an overall quality score (0.0–1.0) into a letter grade.
///
/// | Range       | Grade |
/// |-------------|-------|
/// | >= 0.95     | A+    |
/// | >= 0.90     | A     |
/// | >= 0.80     | B     |
/// | >= 0.65     | C     |
/// | >= 0.40     | D     |
/// | < 0.40      | F     |
pub fn grade(score: f64) -> String {
    match score {
        s if s >= 0.95 => "A+".into(),
        s if s >= 0.90 => "A".into(),
        s if s >= 0.80 => "B".into(),
        s if s >= 0.65 => "C".into(),
        s if s >= 0.40 => "D".into(),
        _ => "F".into(),
    }
}

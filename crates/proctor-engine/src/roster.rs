//! Known identities and nearest-vector matching.

use std::collections::HashMap;

use proctor_models::{Student, StudentId};

/// Finds the closest known identity vector.
pub trait IdentityMatcher: Send + Sync {
    /// Index and distance of the vector in `known` nearest to `query`,
    /// or `None` when `known` is empty.
    fn nearest(&self, query: &[f64], known: &[Vec<f64>]) -> Option<(usize, f64)>;
}

/// Euclidean distance matcher, the metric face encoders are trained for.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl EuclideanMatcher {
    /// Euclidean distance; vectors of different length compare over the shared prefix.
    pub fn distance(a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl IdentityMatcher for EuclideanMatcher {
    fn nearest(&self, query: &[f64], known: &[Vec<f64>]) -> Option<(usize, f64)> {
        known
            .iter()
            .enumerate()
            .map(|(idx, vector)| (idx, Self::distance(query, vector)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Read-only snapshot of registered students and their identity vectors.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    students: Vec<Student>,
    by_usn: HashMap<StudentId, usize>,
    /// Flattened vectors; `owners[i]` is the student index of `vectors[i]`.
    vectors: Vec<Vec<f64>>,
    owners: Vec<usize>,
}

impl Roster {
    pub fn new(students: Vec<Student>) -> Self {
        let mut by_usn = HashMap::with_capacity(students.len());
        let mut vectors = Vec::new();
        let mut owners = Vec::new();

        for (idx, student) in students.iter().enumerate() {
            by_usn.insert(student.usn.clone(), idx);
            for vector in &student.vectors {
                vectors.push(vector.clone());
                owners.push(idx);
            }
        }

        Self {
            students,
            by_usn,
            vectors,
            owners,
        }
    }

    /// Whether any identity vector is registered.
    pub fn has_identities(&self) -> bool {
        !self.vectors.is_empty()
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn student(&self, usn: &StudentId) -> Option<&Student> {
        self.by_usn.get(usn).map(|&idx| &self.students[idx])
    }

    /// Closest student to `query` and its distance, regardless of threshold.
    pub fn best_match(
        &self,
        matcher: &dyn IdentityMatcher,
        query: &[f64],
    ) -> Option<(&StudentId, f64)> {
        let (idx, distance) = matcher.nearest(query, &self.vectors)?;
        let owner = *self.owners.get(idx)?;
        Some((&self.students[owner].usn, distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(usn: &str, vectors: Vec<Vec<f64>>) -> Student {
        Student {
            usn: StudentId::new(usn),
            name: usn.to_lowercase(),
            branch: "CS".to_string(),
            semester: "5".to_string(),
            section: "A".to_string(),
            vectors,
        }
    }

    #[test]
    fn test_nearest_empty_known() {
        assert_eq!(EuclideanMatcher.nearest(&[1.0, 2.0], &[]), None);
    }

    #[test]
    fn test_best_match_across_multiple_vectors() {
        let roster = Roster::new(vec![
            student("A1", vec![vec![0.0, 0.0], vec![1.0, 1.0]]),
            student("B2", vec![vec![5.0, 5.0]]),
        ]);

        let (usn, distance) = roster.best_match(&EuclideanMatcher, &[0.9, 1.0]).unwrap();
        assert_eq!(usn.as_str(), "A1");
        assert!((distance - 0.1).abs() < 1e-9);

        let (usn, _) = roster.best_match(&EuclideanMatcher, &[4.0, 4.5]).unwrap();
        assert_eq!(usn.as_str(), "B2");
    }

    #[test]
    fn test_roster_without_vectors() {
        let roster = Roster::new(vec![student("A1", vec![])]);
        assert!(!roster.has_identities());
        assert!(roster.best_match(&EuclideanMatcher, &[0.0]).is_none());
        assert!(roster.student(&StudentId::new("a1")).is_some());
    }
}

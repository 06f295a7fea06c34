use std::fmt::Write as _;
use std::path::Path;

use spotmatch_types::Metric;

use crate::error::DescriptorError;

/// Component type of a descriptor family together with its distance.
pub trait DescriptorElement: Copy + Send + Sync + 'static {
    fn distance(a: &[Self], b: &[Self]) -> f32;
}

impl DescriptorElement for f32 {
    fn distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b)
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum::<f32>()
            .sqrt()
    }
}

impl DescriptorElement for u8 {
    fn distance(a: &[u8], b: &[u8]) -> f32 {
        a.iter()
            .zip(b)
            .map(|(x, y)| (x ^ y).count_ones())
            .sum::<u32>() as f32
    }
}

/// Row-major matrix of equally sized descriptors.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptors<T> {
    dims: usize,
    data: Vec<T>,
}

impl<T: DescriptorElement> Descriptors<T> {
    /// `data.len()` must be a multiple of `dims`.
    pub fn new(dims: usize, data: Vec<T>) -> Option<Self> {
        if dims == 0 || data.len() % dims != 0 {
            return None;
        }
        Some(Self { dims, data })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, index: usize) -> &[T] {
        &self.data[index * self.dims..(index + 1) * self.dims]
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[T]> {
        self.data.chunks_exact(self.dims)
    }
}

/// Descriptors of one sample for one algorithm. Float families match under
/// L2, binary families under Hamming.
#[derive(Clone, Debug, PartialEq)]
pub enum DescriptorSet {
    Float(Descriptors<f32>),
    Binary(Descriptors<u8>),
}

impl DescriptorSet {
    pub fn metric(&self) -> Metric {
        match self {
            DescriptorSet::Float(_) => Metric::L2,
            DescriptorSet::Binary(_) => Metric::Hamming,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DescriptorSet::Float(set) => set.len(),
            DescriptorSet::Binary(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dims(&self) -> usize {
        match self {
            DescriptorSet::Float(set) => set.dims(),
            DescriptorSet::Binary(set) => set.dims(),
        }
    }

    /// Parses the whitespace-separated text layout: one descriptor per line,
    /// numbers in plain or scientific notation. `path` only labels errors.
    pub fn parse(text: &str, metric: Metric, path: &Path) -> Result<Self, DescriptorError> {
        let mut dims = 0usize;
        let mut values = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let before = values.len();
            for token in trimmed.split_whitespace() {
                let value: f64 = token.parse().map_err(|_| {
                    DescriptorError::corrupt(path, line_no, format!("'{token}' is not a number"))
                })?;
                if !value.is_finite() {
                    return Err(DescriptorError::corrupt(
                        path,
                        line_no,
                        format!("'{token}' is not finite"),
                    ));
                }
                values.push(value);
            }
            let count = values.len() - before;
            if dims == 0 {
                dims = count;
            } else if count != dims {
                return Err(DescriptorError::corrupt(
                    path,
                    line_no,
                    format!("expected {dims} components, found {count}"),
                ));
            }
        }

        if values.is_empty() {
            return Err(DescriptorError::Empty {
                path: path.to_path_buf(),
            });
        }

        match metric {
            Metric::L2 => {
                let data = values.into_iter().map(|v| v as f32).collect();
                Ok(DescriptorSet::Float(Descriptors { dims, data }))
            }
            Metric::Hamming => {
                let mut data = Vec::with_capacity(values.len());
                for (i, value) in values.into_iter().enumerate() {
                    if value.fract() != 0.0 || !(0.0..=255.0).contains(&value) {
                        return Err(DescriptorError::corrupt(
                            path,
                            i / dims + 1,
                            format!("{value} is not a byte"),
                        ));
                    }
                    data.push(value as u8);
                }
                Ok(DescriptorSet::Binary(Descriptors { dims, data }))
            }
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        match self {
            DescriptorSet::Float(set) => write_rows(&mut out, set.rows()),
            DescriptorSet::Binary(set) => write_rows(&mut out, set.rows()),
        }
        out
    }
}

fn write_rows<'a, T, I>(out: &mut String, rows: I)
where
    T: std::fmt::Display + 'a,
    I: Iterator<Item = &'a [T]>,
{
    for row in rows {
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            let _ = write!(out, "{value}");
        }
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scientific_notation() {
        let text = "1.000000000000000000e+00 2.5e-01\n3 4\n";
        let set = DescriptorSet::parse(text, Metric::L2, Path::new("x.txt")).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.dims(), 2);
        match set {
            DescriptorSet::Float(rows) => assert_eq!(rows.row(0), &[1.0, 0.25]),
            DescriptorSet::Binary(_) => panic!("expected float descriptors"),
        }
    }

    #[test]
    fn binary_values_must_be_bytes() {
        let err = DescriptorSet::parse("1 2 300\n", Metric::Hamming, Path::new("x.txt"))
            .unwrap_err();
        assert!(matches!(err, DescriptorError::Corrupt { line: 1, .. }));
        let err =
            DescriptorSet::parse("1.5\n", Metric::Hamming, Path::new("x.txt")).unwrap_err();
        assert!(matches!(err, DescriptorError::Corrupt { .. }));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = DescriptorSet::parse("1 2\n3\n", Metric::L2, Path::new("x.txt")).unwrap_err();
        assert!(matches!(err, DescriptorError::Corrupt { line: 2, .. }));
    }

    #[test]
    fn blank_file_is_empty() {
        let err = DescriptorSet::parse("\n\n", Metric::L2, Path::new("x.txt")).unwrap_err();
        assert!(matches!(err, DescriptorError::Empty { .. }));
    }

    #[test]
    fn hamming_counts_differing_bits() {
        assert_eq!(u8::distance(&[0b1111_0000, 0], &[0b0000_0000, 1]), 5.0);
        assert_eq!(f32::distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
    }
}

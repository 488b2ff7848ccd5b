// mod.rs - Output formatters module

use std::collections::BTreeMap;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use ndarray::{Array2, ArrayView2};

use crate::data::{AlleleCountTensor, VariantClass};
use crate::error::{PairdivError, Result};

/// Format a float the way C's `%g` does: six significant digits, trailing
/// zeros removed, scientific notation for exponents below -4 or from 6 up.
pub fn format_g(value: f64) -> String {
    if !value.is_finite() {
        return if value.is_nan() {
            "nan".to_string()
        } else if value > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }

    let scientific = format!("{:.5e}", value);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim_zeros(mantissa), sign, exponent.abs())
    } else {
        let decimals = (5 - exponent) as usize;
        trim_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn trim_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// PHYLIP distance matrix: the sample count, then one tab-separated line
/// per sample.
pub fn phylip_distance_matrix_str(matrix: ArrayView2<f64>, samples: &[String]) -> Result<String> {
    let n = samples.len();
    if matrix.dim() != (n, n) {
        return Err(PairdivError::shape(
            "phylip distance matrix",
            format!("({}, {})", n, n),
            format!("{:?}", matrix.dim()),
        ));
    }

    let mut lines = Vec::with_capacity(n + 1);
    lines.push(n.to_string());
    for (name, row) in samples.iter().zip(matrix.rows()) {
        let mut line = name.clone();
        for value in row.iter() {
            line.push('\t');
            line.push_str(&format_g(*value));
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// Ensure parent directory exists before creating file
fn ensure_parent_dir(file_path: &Path) -> Result<()> {
    if let Some(parent) = file_path.parent() {
        create_dir_all(parent)?;
    }
    Ok(())
}

/// Write distance matrix in PHYLIP format
pub fn write_phylip<P: AsRef<Path>>(file_path: P, matrix: ArrayView2<f64>, samples: &[String]) -> Result<()> {
    let file_path = file_path.as_ref();
    let content = phylip_distance_matrix_str(matrix, samples)?;
    ensure_parent_dir(file_path)?;
    let mut writer = BufWriter::new(File::create(file_path)?);
    writeln!(writer, "{}", content)?;
    writer.flush()?;
    info!("Distance matrix written to: {}", file_path.display());
    Ok(())
}

/// How a sample's alt frequency at a site differs from the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteAnnotation {
    NoDifference,
    FixedSynonymous,
    FixedNonsynonymous,
    PolymorphicSynonymous,
    PolymorphicNonsynonymous,
}

impl SiteAnnotation {
    /// Classify an alt frequency. Only fourfold degenerate sites count as
    /// synonymous.
    pub fn classify(alt_freq: f64, variant_class: VariantClass) -> Self {
        let synonymous = variant_class.is_synonymous();
        if alt_freq == 0.0 {
            SiteAnnotation::NoDifference
        } else if alt_freq == 1.0 {
            if synonymous {
                SiteAnnotation::FixedSynonymous
            } else {
                SiteAnnotation::FixedNonsynonymous
            }
        } else if synonymous {
            SiteAnnotation::PolymorphicSynonymous
        } else {
            SiteAnnotation::PolymorphicNonsynonymous
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            SiteAnnotation::NoDifference => 0,
            SiteAnnotation::FixedSynonymous => 1,
            SiteAnnotation::FixedNonsynonymous => 2,
            SiteAnnotation::PolymorphicSynonymous => 3,
            SiteAnnotation::PolymorphicNonsynonymous => 4,
        }
    }
}

/// Sites × samples annotation of a tensor. Uncovered samples are
/// annotated as no difference.
pub fn annotate_sites(alleles: &AlleleCountTensor, variant_class: VariantClass) -> Array2<SiteAnnotation> {
    alleles
        .alt_freqs()
        .mapv(|freq| SiteAnnotation::classify(freq, variant_class))
}

/// Write consensus calls and site annotations for every location, in
/// location order.
///
/// `locations` maps a genomic position to a site index within the tensor of
/// its variant class. Each output line is the position followed by one value
/// per sample. Returns the number of locations written.
pub fn write_haplotypes<C: Write, A: Write>(
    tensors: &BTreeMap<VariantClass, AlleleCountTensor>,
    locations: &BTreeMap<u64, (usize, VariantClass)>,
    consensus_out: C,
    annotation_out: A,
) -> Result<usize> {
    let mut consensus_calls = BTreeMap::new();
    let mut annotations = BTreeMap::new();
    for (&class, alleles) in tensors {
        consensus_calls.insert(class, alleles.consensus());
        annotations.insert(class, annotate_sites(alleles, class));
    }

    let mut consensus_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(consensus_out);
    let mut annotation_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(annotation_out);

    for (&location, &(index, class)) in locations {
        let (calls, codes) = match (consensus_calls.get(&class), annotations.get(&class)) {
            (Some(calls), Some(codes)) => (calls, codes),
            _ => {
                return Err(PairdivError::InvalidParameter(format!(
                    "location {} refers to variant class {} with no allele counts",
                    location, class
                )))
            }
        };
        if index >= calls.nrows() {
            return Err(PairdivError::InvalidParameter(format!(
                "location {} refers to site {} but class {} has {} sites",
                location,
                index,
                class,
                calls.nrows()
            )));
        }

        let position = location.to_string();
        let mut record = vec![position.clone()];
        record.extend(calls.row(index).iter().map(|&call| (call as u8).to_string()));
        consensus_writer.write_record(&record)?;

        let mut record = vec![position];
        record.extend(codes.row(index).iter().map(|a| a.code().to_string()));
        annotation_writer.write_record(&record)?;
    }

    consensus_writer.flush()?;
    annotation_writer.flush()?;
    Ok(locations.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_format_g() {
        assert_eq!(format_g(0.0), "0");
        assert_eq!(format_g(1.0), "1");
        assert_eq!(format_g(0.5), "0.5");
        assert_eq!(format_g(1.0 / 3.0), "0.333333");
        assert_eq!(format_g(-2.25), "-2.25");
        assert_eq!(format_g(100000.0), "100000");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
        assert_eq!(format_g(0.0001), "0.0001");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(f64::NAN), "nan");
    }

    #[test]
    fn test_phylip_str() {
        let matrix = array![[0.0, 0.25], [0.25, 0.0]];
        let samples = vec!["s1".to_string(), "s2".to_string()];
        let text = phylip_distance_matrix_str(matrix.view(), &samples).unwrap();
        assert_eq!(text, "2\ns1\t0\t0.25\ns2\t0.25\t0");
    }

    #[test]
    fn test_phylip_length_mismatch() {
        let matrix = array![[0.0, 1.0], [1.0, 0.0]];
        let samples = vec!["s1".to_string()];
        assert!(matches!(
            phylip_distance_matrix_str(matrix.view(), &samples),
            Err(PairdivError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_annotation_codes() {
        // per sample: ref only, alt only, mixed, uncovered
        let alleles = AlleleCountTensor::from_shape_vec(1, 4, vec![0, 5, 5, 0, 2, 3, 0, 0]).unwrap();

        let synonymous: Vec<u8> = annotate_sites(&alleles, VariantClass::FourD)
            .iter()
            .map(|a| a.code())
            .collect();
        assert_eq!(synonymous, vec![0, 1, 3, 0]);

        let nonsynonymous: Vec<u8> = annotate_sites(&alleles, VariantClass::OneD)
            .iter()
            .map(|a| a.code())
            .collect();
        assert_eq!(nonsynonymous, vec![0, 2, 4, 0]);
    }

    #[test]
    fn test_write_haplotypes() {
        let mut tensors = BTreeMap::new();
        tensors.insert(
            VariantClass::FourD,
            AlleleCountTensor::from_shape_vec(2, 2, vec![3, 1, 0, 4, 4, 0, 1, 1]).unwrap(),
        );
        tensors.insert(
            VariantClass::OneD,
            AlleleCountTensor::from_shape_vec(1, 2, vec![0, 2, 2, 0]).unwrap(),
        );

        let mut locations = BTreeMap::new();
        locations.insert(1500, (1, VariantClass::FourD));
        locations.insert(200, (0, VariantClass::FourD));
        locations.insert(900, (0, VariantClass::OneD));

        let mut consensus = Vec::new();
        let mut annotation = Vec::new();
        let written = write_haplotypes(&tensors, &locations, &mut consensus, &mut annotation).unwrap();
        assert_eq!(written, 3);

        // the (1, 1) site has frequency 0.5, which rounds to 0
        assert_eq!(String::from_utf8(consensus).unwrap(), "200,1,0\n900,0,1\n1500,1,0\n");
        assert_eq!(String::from_utf8(annotation).unwrap(), "200,3,0\n900,0,2\n1500,1,3\n");
    }

    #[test]
    fn test_write_haplotypes_unknown_class() {
        let tensors = BTreeMap::new();
        let mut locations = BTreeMap::new();
        locations.insert(10, (0, VariantClass::TwoD));
        let result = write_haplotypes(&tensors, &locations, Vec::<u8>::new(), Vec::<u8>::new());
        assert!(matches!(result, Err(PairdivError::InvalidParameter(_))));
    }

    #[test]
    fn test_write_phylip_creates_parent() {
        let dir = std::env::temp_dir().join(format!("pairdiv_phylip_{}", std::process::id()));
        let path = dir.join("nested").join("pi.phy");
        let matrix = array![[0.0, 0.5], [0.5, 0.0]];
        let samples = vec!["a".to_string(), "b".to_string()];

        write_phylip(&path, matrix.view(), &samples).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        assert_eq!(content, "2\na\t0\t0.5\nb\t0.5\t0\n");
    }
}

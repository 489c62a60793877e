use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;
use serde::Deserialize;
use serde::Serialize;

use crate::error::PipelineError;

/// Number of physicochemical feature columns in a record.
pub const FEATURE_COUNT: usize = 11;

/// Total columns per data row: the features, the quality label, the id.
pub const FIELD_COUNT: usize = 13;

/// One row of wine data.
///
/// Column order is authoritative: files are read positionally and header
/// names, when a header row is present, are ignored entirely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WineRecord {
    pub fixed_acidity: f32,
    pub volatile_acidity: f32,
    pub citric_acid: f32,
    pub residual_sugar: f32,
    pub chlorides: f32,
    pub free_sulfur_dioxide: f32,
    pub total_sulfur_dioxide: f32,
    pub density: f32,
    pub ph: f32,
    pub sulphates: f32,
    pub alcohol: f32,
    pub quality: f32,
    pub id: f32,
}

impl WineRecord {
    /// The 11 feature values in fixed column order. The quality label and
    /// the id never appear in the vector.
    pub fn features(&self) -> [f32; FEATURE_COUNT] {
        [
            self.fixed_acidity,
            self.volatile_acidity,
            self.citric_acid,
            self.residual_sugar,
            self.chlorides,
            self.free_sulfur_dioxide,
            self.total_sulfur_dioxide,
            self.density,
            self.ph,
            self.sulphates,
            self.alcohol,
        ]
    }
}

/// How a delimited data file should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub has_headers: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
        }
    }
}

/// Read every record from a delimited file.
///
/// The file handle is scoped to this call and released on every exit path,
/// including parse failures partway through.
pub fn load_records(path: &Path, options: LoadOptions) -> Result<Vec<WineRecord>, PipelineError> {
    let file = File::open(path).map_err(|source| PipelineError::ReadData {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(options.has_headers)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row_number = index + 1;
        let row = row.map_err(|source| PipelineError::MalformedRow {
            row: row_number,
            source,
        })?;

        if row.len() != FIELD_COUNT {
            return Err(PipelineError::ColumnCount {
                row: row_number,
                expected: FIELD_COUNT,
                found: row.len(),
            });
        }

        // Positional deserialization: passing no headers maps column i to
        // field i, which keeps column index authoritative over names.
        let record: WineRecord =
            row.deserialize(None)
                .map_err(|source| PipelineError::MalformedRow {
                    row: row_number,
                    source,
                })?;
        records.push(record);
    }

    debug!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    const HEADER: &str = "fixed acidity,volatile acidity,citric acid,residual sugar,chlorides,free sulfur dioxide,total sulfur dioxide,density,pH,sulphates,alcohol,quality,id\n";

    #[test]
    fn loads_every_row_positionally() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            &tmp,
            "train.csv",
            &format!(
                "{HEADER}7.4,0.70,0.00,1.9,0.076,11,34,0.9978,3.51,0.56,9.4,5,1\n\
                 7.8,0.88,0.00,2.6,0.098,25,67,0.9968,3.20,0.68,9.8,5,2\n"
            ),
        );

        let records = load_records(&path, LoadOptions::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fixed_acidity, 7.4);
        assert_eq!(records[0].free_sulfur_dioxide, 11.0);
        assert_eq!(records[0].quality, 5.0);
        assert_eq!(records[0].id, 1.0);
        assert_eq!(records[1].volatile_acidity, 0.88);
        assert_eq!(records[1].id, 2.0);
    }

    #[test]
    fn header_names_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            &tmp,
            "odd.csv",
            "a,b,c,d,e,f,g,h,i,j,k,l,m\n7.4,0.70,0.00,1.9,0.076,11,34,0.9978,3.51,0.56,9.4,5,1\n",
        );

        let records = load_records(&path, LoadOptions::default()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].alcohol, 9.4);
    }

    #[test]
    fn reads_headerless_files() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            &tmp,
            "plain.csv",
            "7.4,0.70,0.00,1.9,0.076,11,34,0.9978,3.51,0.56,9.4,5,1\n",
        );

        let options = LoadOptions {
            has_headers: false,
            ..LoadOptions::default()
        };
        let records = load_records(&path, options).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 1.0);
    }

    #[test]
    fn respects_alternate_delimiters() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            &tmp,
            "semi.csv",
            "7.4;0.70;0.00;1.9;0.076;11;34;0.9978;3.51;0.56;9.4;5;1\n",
        );

        let options = LoadOptions {
            delimiter: b';',
            has_headers: false,
        };
        let records = load_records(&path, options).unwrap();
        assert_eq!(records[0].sulphates, 0.56);
    }

    #[test]
    fn rejects_wrong_column_count_with_row_index() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            &tmp,
            "short.csv",
            &format!(
                "{HEADER}7.4,0.70,0.00,1.9,0.076,11,34,0.9978,3.51,0.56,9.4,5,1\n\
                 7.8,0.88,0.00\n"
            ),
        );

        let err = load_records(&path, LoadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ColumnCount {
                row: 2,
                expected: FIELD_COUNT,
                found: 3,
            }
        ));
    }

    #[test]
    fn rejects_non_numeric_values_with_row_index() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            &tmp,
            "bad.csv",
            &format!("{HEADER}7.4,oops,0.00,1.9,0.076,11,34,0.9978,3.51,0.56,9.4,5,1\n"),
        );

        let err = load_records(&path, LoadOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRow { row: 1, .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_records(&tmp.path().join("nope.csv"), LoadOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::ReadData { .. }));
    }

    #[test]
    fn empty_file_yields_no_records() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(&tmp, "empty.csv", HEADER);
        let records = load_records(&path, LoadOptions::default()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn feature_vector_excludes_label_and_id() {
        let record = WineRecord {
            fixed_acidity: 7.4,
            volatile_acidity: 0.70,
            citric_acid: 0.00,
            residual_sugar: 1.9,
            chlorides: 0.076,
            free_sulfur_dioxide: 11.0,
            total_sulfur_dioxide: 34.0,
            density: 0.9978,
            ph: 3.51,
            sulphates: 0.56,
            alcohol: 9.4,
            quality: 5.0,
            id: 1.0,
        };

        let features = record.features();
        assert_eq!(features.len(), FEATURE_COUNT);
        assert_eq!(features[0], 7.4);
        assert_eq!(features[10], 9.4);
        assert!(!features.contains(&5.0));
        assert!(!features.contains(&1.0));
    }
}

use log::debug;
use serde::Deserialize;
use serde::Serialize;

use crate::dataset::WineRecord;
use crate::error::PipelineError;
use crate::model::QualityModel;

/// A scored record: the identifier and true label travel with the model
/// output so callers can report them together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: f32,
    pub quality: f32,
    pub predicted: f32,
}

/// Apply the model to every record, in input order.
pub fn predict_records<M: QualityModel>(
    model: &M,
    records: &[WineRecord],
) -> Result<Vec<Prediction>, PipelineError> {
    if records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let scores = model.predict(records);
    let predictions: Vec<Prediction> = records
        .iter()
        .zip(scores)
        .map(|(record, predicted)| Prediction {
            id: record.id,
            quality: record.quality,
            predicted,
        })
        .collect();

    debug!("scored {} records", predictions.len());
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GbdtRegressor;
    use crate::model::TrainerSettings;

    struct ConstantModel(f32);

    impl QualityModel for ConstantModel {
        fn predict(&self, records: &[WineRecord]) -> Vec<f32> {
            vec![self.0; records.len()]
        }
    }

    fn record(values: [f32; 13]) -> WineRecord {
        WineRecord {
            fixed_acidity: values[0],
            volatile_acidity: values[1],
            citric_acid: values[2],
            residual_sugar: values[3],
            chlorides: values[4],
            free_sulfur_dioxide: values[5],
            total_sulfur_dioxide: values[6],
            density: values[7],
            ph: values[8],
            sulphates: values[9],
            alcohol: values[10],
            quality: values[11],
            id: values[12],
        }
    }

    #[test]
    fn empty_input_is_an_error() {
        let err = predict_records(&ConstantModel(5.0), &[]).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
    }

    #[test]
    fn keeps_input_order_and_carries_id_and_label() {
        let records = vec![
            record([7.4, 0.70, 0.00, 1.9, 0.076, 11.0, 34.0, 0.9978, 3.51, 0.56, 9.4, 5.0, 1.0]),
            record([7.8, 0.88, 0.00, 2.6, 0.098, 25.0, 67.0, 0.9968, 3.20, 0.68, 9.8, 6.0, 2.0]),
        ];

        let predictions = predict_records(&ConstantModel(5.5), &records).unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].id, 1.0);
        assert_eq!(predictions[0].quality, 5.0);
        assert_eq!(predictions[1].id, 2.0);
        assert_eq!(predictions[1].quality, 6.0);
        assert!(predictions.iter().all(|p| p.predicted == 5.5));
    }

    #[test]
    fn reports_the_final_record_of_a_trained_run() {
        // The documented scenario: two training rows, a one-row test file
        // with id 3 and quality 5 must yield a finite prediction for it.
        let train = vec![
            record([7.4, 0.70, 0.00, 1.9, 0.076, 11.0, 34.0, 0.9978, 3.51, 0.56, 9.4, 5.0, 1.0]),
            record([7.8, 0.88, 0.00, 2.6, 0.098, 25.0, 67.0, 0.9968, 3.20, 0.68, 9.8, 5.0, 2.0]),
        ];
        let test = vec![record([
            7.4, 0.70, 0.00, 1.9, 0.076, 11.0, 34.0, 0.9978, 3.51, 0.56, 9.4, 5.0, 3.0,
        ])];

        let model = GbdtRegressor::fit(&train, &TrainerSettings::default().resolve()).unwrap();
        let predictions = predict_records(&model, &test).unwrap();

        let last = predictions.last().unwrap();
        assert_eq!(last.id, 3.0);
        assert_eq!(last.quality, 5.0);
        assert!(last.predicted.is_finite());
    }
}

use log::debug;
use serde::Deserialize;
use serde::Serialize;

use crate::dataset::WineRecord;
use crate::error::PipelineError;
use crate::model::QualityModel;

/// Aggregate regression metrics over a held-out set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    /// Root of the mean squared error between predicted and true labels.
    pub rmse: f64,
    /// Mean squared loss, the quantity the trainer minimizes.
    pub loss: f64,
    /// Coefficient of determination.
    pub r_squared: f64,
    /// Number of scored records.
    pub records: usize,
}

/// Score a trained model against held-out records. Reads the model and the
/// records, mutates neither.
pub fn evaluate<M: QualityModel>(
    model: &M,
    records: &[WineRecord],
) -> Result<RegressionReport, PipelineError> {
    if records.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let predicted = model.predict(records);
    let count = records.len() as f64;

    let mut squared_error = 0.0f64;
    let mut label_sum = 0.0f64;
    for (record, prediction) in records.iter().zip(&predicted) {
        let residual = f64::from(record.quality) - f64::from(*prediction);
        squared_error += residual * residual;
        label_sum += f64::from(record.quality);
    }

    let loss = squared_error / count;
    let rmse = loss.sqrt();

    let label_mean = label_sum / count;
    let total_variance: f64 = records
        .iter()
        .map(|record| {
            let deviation = f64::from(record.quality) - label_mean;
            deviation * deviation
        })
        .sum();

    // A constant-label set carries no variance to explain: score a perfect
    // fit as 1 and anything else as 0, so the report never contains NaN.
    let r_squared = if total_variance == 0.0 {
        if squared_error == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - squared_error / total_variance
    };

    debug!(
        "evaluated {} records: rmse={rmse:.4} loss={loss:.4} r2={r_squared:.4}",
        records.len()
    );

    Ok(RegressionReport {
        rmse,
        loss,
        r_squared,
        records: records.len(),
    })
}

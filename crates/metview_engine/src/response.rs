use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{ApiError, FailureKind, MetSample, MetSeries, PlotResponse};

const TIME_COLUMN: &str = "Time";

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    #[serde(default)]
    filename: Option<String>,
    data: Map<String, Value>,
}

/// Parses `{ filename?, data: { Time: [...], <met_column>: [...] } }`.
///
/// Columns may be plain arrays or index-keyed objects (`{"0": .., "1": ..}`).
pub fn parse_met_series(body: &[u8], met_column: &str) -> Result<MetSeries, ApiError> {
    let envelope: UploadEnvelope = serde_json::from_slice(body)
        .map_err(|err| ApiError::new(FailureKind::ResponseShape, err.to_string()))?;

    let times = column(&envelope.data, TIME_COLUMN)?;
    let mets = column(&envelope.data, met_column)?;
    if times.len() != mets.len() {
        return Err(ApiError::new(
            FailureKind::ResponseShape,
            format!(
                "column length mismatch: {} times, {} estimates",
                times.len(),
                mets.len()
            ),
        ));
    }

    let samples = times
        .into_iter()
        .zip(mets)
        .map(|(time, met)| {
            Ok(MetSample {
                time: time_label(time),
                met: met_value(met)?,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()?;

    Ok(MetSeries {
        source_filename: envelope.filename,
        samples,
    })
}

pub fn parse_plot_response(body: &[u8]) -> Result<PlotResponse, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::new(FailureKind::ResponseShape, err.to_string()))
}

fn column<'a>(data: &'a Map<String, Value>, name: &str) -> Result<Vec<&'a Value>, ApiError> {
    match data.get(name) {
        Some(Value::Array(values)) => Ok(values.iter().collect()),
        Some(Value::Object(indexed)) => {
            let mut entries = indexed
                .iter()
                .map(|(key, value)| {
                    key.parse::<u64>().map(|idx| (idx, value)).map_err(|_| {
                        ApiError::new(
                            FailureKind::ResponseShape,
                            format!("column {name:?} has non-numeric index {key:?}"),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            entries.sort_by_key(|(idx, _)| *idx);
            Ok(entries.into_iter().map(|(_, value)| value).collect())
        }
        Some(_) => Err(ApiError::new(
            FailureKind::ResponseShape,
            format!("column {name:?} is not a list"),
        )),
        None => Err(ApiError::new(
            FailureKind::ResponseShape,
            format!("missing column {name:?}"),
        )),
    }
}

fn time_label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn met_value(value: &Value) -> Result<Option<f64>, ApiError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(number) => Ok(number.as_f64()),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => text.trim().parse::<f64>().map(Some).map_err(|_| {
            ApiError::new(
                FailureKind::ResponseShape,
                format!("estimate {text:?} is not a number"),
            )
        }),
        other => Err(ApiError::new(
            FailureKind::ResponseShape,
            format!("estimate {other} is not a number"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACTI: &str = "ActiGraph VM3 Estimation (MET)";

    #[test]
    fn parses_array_columns() {
        let body = br#"{"filename":"a.csv","data":{"Time":["10:00","10:01"],"ActiGraph VM3 Estimation (MET)":[1.25,null]}}"#;
        let series = parse_met_series(body, ACTI).unwrap();
        assert_eq!(series.source_filename.as_deref(), Some("a.csv"));
        assert_eq!(
            series.samples,
            vec![
                MetSample {
                    time: "10:00".to_string(),
                    met: Some(1.25)
                },
                MetSample {
                    time: "10:01".to_string(),
                    met: None
                },
            ]
        );
    }

    #[test]
    fn parses_index_keyed_columns_in_numeric_order() {
        let body = br#"{"data":{"Time":{"10":1700000060000,"2":1700000000000},"Wrist Estimation (MET)":{"2":"1.5","10":2}}}"#;
        let series = parse_met_series(body, "Wrist Estimation (MET)").unwrap();
        let times: Vec<_> = series.samples.iter().map(|s| s.time.as_str()).collect();
        assert_eq!(times, vec!["1700000000000", "1700000060000"]);
        assert_eq!(series.samples[0].met, Some(1.5));
        assert_eq!(series.samples[1].met, Some(2.0));
    }

    #[test]
    fn rejects_missing_or_mismatched_columns() {
        let missing = br#"{"data":{"Time":[]}}"#;
        let err = parse_met_series(missing, ACTI).unwrap_err();
        assert_eq!(err.kind, FailureKind::ResponseShape);

        let mismatch = br#"{"data":{"Time":["a","b"],"ActiGraph VM3 Estimation (MET)":[1]}}"#;
        let err = parse_met_series(mismatch, ACTI).unwrap_err();
        assert!(err.message.contains("mismatch"));
    }

    #[test]
    fn plot_response_needs_both_plots() {
        let plots = parse_plot_response(br#"{"plot1":"<div>1</div>","plot2":"<div>2</div>"}"#)
            .unwrap();
        assert_eq!(plots.plot2, "<div>2</div>");
        assert!(parse_plot_response(br#"{"plot1":"x"}"#).is_err());
    }
}

pub mod error;
pub mod ground_truth;
pub mod options;
pub mod parser;
pub mod reconciler;
pub mod summary;
pub mod tcx_types;
pub mod writer;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::error::TcxFixError;
use crate::ground_truth::meters_to_miles;
use crate::options::CorrectionOptions;
use crate::summary::CorrectionSummary;

/// Corrected document plus what was done to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FixOutcome {
    pub tcx: String,
    pub summary: CorrectionSummary,
}

/// Correct a TCX document against a laps file.
///
/// Runs parse, load, reconcile and write in order; any failure aborts the
/// whole run and no document is produced.
pub fn fix_tcx(
    tcx: &str,
    laps: &str,
    opts: &CorrectionOptions,
) -> Result<FixOutcome, TcxFixError> {
    let truth = ground_truth::parse_ground_truth(laps, opts.target)?;
    let doc = parser::parse_tcx(tcx)?;
    let activity = doc.single_activity()?;
    let correction = reconciler::correct_activity(activity, &truth, opts)?;
    let tcx = writer::write_corrected(tcx, &correction)?;
    Ok(FixOutcome {
        tcx,
        summary: correction.summary,
    })
}

/// A laps file listing each lap's recorded distance in miles, ready to be
/// edited into the true distances.
pub fn lap_template(tcx: &str) -> Result<String, TcxFixError> {
    let doc = parser::parse_tcx(tcx)?;
    let activity = doc.single_activity()?;
    Ok(activity
        .laps
        .iter()
        .map(|lap| format!("{:.3}\n", meters_to_miles(lap.distance_meters)))
        .collect())
}

/// Correct a TCX string, returning the corrected TCX string.
#[wasm_bindgen(js_name = fixTcx)]
pub fn fix_tcx_string(tcx: &str, laps: &str, options: JsValue) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let outcome = fix_tcx(tcx, laps, &opts)?;
    Ok(outcome.tcx)
}

/// Correct a TCX string, returning `{ tcx, summary }` as a JS object.
#[wasm_bindgen(js_name = fixTcxReport)]
pub fn fix_tcx_report(tcx: &str, laps: &str, options: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let opts = parse_options(options)?;
    let outcome = fix_tcx(tcx, laps, &opts)?;
    serde_wasm_bindgen::to_value(&outcome).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Laps file template with the recorded distance of every lap.
#[wasm_bindgen(js_name = lapTemplate)]
pub fn lap_template_string(tcx: &str) -> Result<String, JsValue> {
    console_error_panic_hook::set_once();

    Ok(lap_template(tcx)?)
}

fn parse_options(options: JsValue) -> Result<CorrectionOptions, JsValue> {
    if options.is_undefined() || options.is_null() {
        Ok(CorrectionOptions::default())
    } else {
        serde_wasm_bindgen::from_value(options).map_err(|e| JsValue::from_str(&e.to_string()))
    }
}

//! Server-side HTML for the single prediction page.

use std::fmt::Write;

use crate::form::FormInput;
use crate::model::Prediction;
use crate::types::{
    Borough, BusCompany, Reason, RunType, SchoolYear, Slider, StudentType, DAY_OF_WEEK, HOUR,
    MONTH, OTHER_ROUTE, ROUTE_CATALOG, STUDENTS,
};

pub const TITLE: &str = "🚌 Predict School Bus Delay and Breakdown";
pub const PROMPT: &str = "Enter the following information:";

/// What goes in the result area below the form.
#[derive(Debug, Clone, Copy)]
pub enum ResultView<'a> {
    Prediction(&'a Prediction),
    Error(&'a str),
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn select<'a>(
    out: &mut String,
    name: &str,
    label: &str,
    options: impl IntoIterator<Item = &'a str>,
    selected: Option<&str>,
    onchange: Option<&str>,
) {
    let _ = write!(
        out,
        r#"<label for="{name}">{}</label><select id="{name}" name="{name}""#,
        escape(label)
    );
    if let Some(js) = onchange {
        let _ = write!(out, r#" onchange="{js}""#);
    }
    out.push('>');
    for opt in options {
        let sel = if Some(opt) == selected { " selected" } else { "" };
        let opt = escape(opt);
        let _ = write!(out, r#"<option value="{opt}"{sel}>{opt}</option>"#);
    }
    out.push_str("</select>\n");
}

fn slider(out: &mut String, name: &str, s: &Slider, value: Option<i64>) {
    let v = value.unwrap_or(i64::from(s.default));
    let _ = writeln!(
        out,
        concat!(
            r#"<label for="{name}">{label}: <output id="{name}_out">{v}</output></label>"#,
            r#"<input type="range" id="{name}" name="{name}" min="{min}" max="{max}" value="{v}""#,
            r#" oninput="document.getElementById('{name}_out').value = this.value">"#,
        ),
        name = name,
        v = v,
        label = escape(s.label),
        min = s.min,
        max = s.max,
    );
}

fn checkbox(out: &mut String, name: &str, label: &str, checked: bool) {
    let c = if checked { " checked" } else { "" };
    let _ = writeln!(
        out,
        r#"<label><input type="checkbox" name="{name}" value="true"{c}> {}</label>"#,
        escape(label)
    );
}

fn result(out: &mut String, view: ResultView<'_>) {
    out.push_str(r#"<section id="result">"#);
    match view {
        ResultView::Prediction(p) => {
            let _ = write!(
                out,
                concat!(
                    r#"<h3>Prediction: <strong>{}</strong></h3>"#,
                    r#"<progress max="1" value="{:.4}"></progress>"#,
                    r#"<p class="caption">Confidence: {}</p>"#,
                ),
                p.outcome.badge(),
                p.confidence,
                p.confidence_text()
            );
        }
        ResultView::Error(msg) => {
            let _ = write!(out, r#"<p class="error">Prediction failed: {}</p>"#, escape(msg));
        }
    }
    out.push_str("</section>\n");
}

/// Renders the whole page: title, prompt, widgets in record order with the
/// submitted selections kept, then the result area.
pub fn page(input: &FormInput, view: Option<ResultView<'_>>) -> String {
    let mut out = String::with_capacity(16 * 1024);
    let _ = write!(
        out,
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{TITLE}</title>\
         <style>body{{font-family:sans-serif;max-width:42rem;margin:2rem auto}}\
         label,select,input[type=range],input[type=text]\
         {{display:block;width:100%;margin-top:.6rem}}\
         progress{{width:100%}}.caption{{color:#666;font-size:.85rem}}.error{{color:#b00}}</style>\
         </head><body>\n<h1>{TITLE}</h1>\n<p>{PROMPT}</p>\n\
         <form method=\"post\" action=\"/\" onchange=\"this.requestSubmit()\">\n"
    );

    select(
        &mut out,
        "school_year",
        "School Year",
        SchoolYear::ALL.iter().map(|v| v.label()),
        input.school_year.as_deref(),
        None,
    );
    slider(&mut out, "num_students", &STUDENTS, input.num_students);
    select(
        &mut out,
        "run_type",
        "Run Type",
        RunType::ALL.iter().map(|v| v.label()),
        input.run_type.as_deref(),
        None,
    );
    select(
        &mut out,
        "reason",
        "Reason",
        Reason::ALL.iter().map(|v| v.label()),
        input.reason.as_deref(),
        None,
    );
    select(
        &mut out,
        "borough",
        "Borough",
        Borough::ALL.iter().map(|v| v.label()),
        input.borough.as_deref(),
        None,
    );
    slider(&mut out, "hour", &HOUR, input.hour);
    slider(&mut out, "month", &MONTH, input.month);
    slider(&mut out, "day_of_week", &DAY_OF_WEEK, input.day_of_week);
    select(
        &mut out,
        "school_age_or_prek",
        "Student Type",
        StudentType::ALL.iter().map(|v| v.label()),
        input.school_age_or_prek.as_deref(),
        None,
    );
    select(
        &mut out,
        "bus_company",
        "Bus Company",
        BusCompany::ALL.iter().map(|v| v.label()),
        input.bus_company.as_deref(),
        None,
    );

    select(
        &mut out,
        "route_choice",
        "Route Number (type to search or select)",
        ROUTE_CATALOG.iter().copied().chain([OTHER_ROUTE]),
        input.route_choice.as_deref(),
        Some("document.getElementById('route_manual').disabled = this.value !== 'Other'"),
    );
    let disabled = if input.route_is_other() { "" } else { " disabled" };
    let _ = writeln!(
        out,
        concat!(
            r#"<label for="route_manual">Enter Route Number Manually</label>"#,
            r#"<input type="text" id="route_manual" name="route_manual" value="{}"{disabled}>"#,
        ),
        escape(input.route_manual.as_deref().unwrap_or_default()),
        disabled = disabled,
    );

    checkbox(
        &mut out,
        "contract_notified_schools",
        "Contractor Notified Schools?",
        input.contract_notified_schools,
    );
    checkbox(
        &mut out,
        "contract_notified_parents",
        "Contractor Notified Parents?",
        input.contract_notified_parents,
    );
    checkbox(&mut out, "alerted_opt", "Alerted OPT?", input.alerted_opt);

    out.push_str("<button type=\"submit\">Predict</button>\n</form>\n");
    if let Some(view) = view {
        result(&mut out, view);
    }
    out.push_str("</body></html>\n");
    out
}

use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::types::{
    Borough, BusCompany, Reason, RouteNumber, RunType, SchoolYear, StudentType, TripRecord,
    DAY_OF_WEEK, HOUR, MONTH, ROUTE_CATALOG, STUDENTS,
};

/// Raw widget state of one submission, as posted by the page or sent to the
/// JSON endpoint. Unchecked checkboxes are simply absent.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FormInput {
    pub school_year: Option<String>,
    pub num_students: Option<i64>,
    pub run_type: Option<String>,
    pub reason: Option<String>,
    pub borough: Option<String>,
    pub hour: Option<i64>,
    pub month: Option<i64>,
    pub day_of_week: Option<i64>,
    pub school_age_or_prek: Option<String>,
    pub bus_company: Option<String>,
    pub route_choice: Option<String>,
    #[serde(default)]
    pub route_manual: Option<String>,
    #[serde(default)]
    pub contract_notified_schools: bool,
    #[serde(default)]
    pub contract_notified_parents: bool,
    #[serde(default)]
    pub alerted_opt: bool,
}

impl Default for FormInput {
    /// The page as first shown: first dropdown entries, slider defaults,
    /// every box unchecked.
    fn default() -> Self {
        Self {
            school_year: Some(SchoolYear::default().label().into()),
            num_students: Some(STUDENTS.default.into()),
            run_type: Some(RunType::default().label().into()),
            reason: Some(Reason::default().label().into()),
            borough: Some(Borough::default().label().into()),
            hour: Some(HOUR.default.into()),
            month: Some(MONTH.default.into()),
            day_of_week: Some(DAY_OF_WEEK.default.into()),
            school_age_or_prek: Some(StudentType::default().label().into()),
            bus_company: Some(BusCompany::default().label().into()),
            route_choice: Some(ROUTE_CATALOG[0].into()),
            route_manual: None,
            contract_notified_schools: false,
            contract_notified_parents: false,
            alerted_opt: false,
        }
    }
}

fn parse<T>(value: &Option<String>, column: &'static str) -> Result<T, FormError>
where
    T: std::str::FromStr<Err = FormError>,
{
    value.as_deref().ok_or(FormError::Missing(column))?.parse()
}

impl FormInput {
    /// Assembles the trip record. Values outside a widget's domain are
    /// rejected rather than coerced.
    pub fn to_record(&self) -> Result<TripRecord, FormError> {
        let mut b = TripRecord::builder()
            .school_year(parse(&self.school_year, SchoolYear::COLUMN)?)
            .run_type(parse(&self.run_type, RunType::COLUMN)?)
            .reason(parse(&self.reason, Reason::COLUMN)?)
            .borough(parse(&self.borough, Borough::COLUMN)?)
            .student_type(parse(&self.school_age_or_prek, StudentType::COLUMN)?)
            .bus_company(parse(&self.bus_company, BusCompany::COLUMN)?)
            .notified_schools(self.contract_notified_schools)
            .notified_parents(self.contract_notified_parents)
            .alerted_opt(self.alerted_opt);

        if let Some(v) = self.num_students {
            b = b.students(v);
        }
        if let Some(v) = self.hour {
            b = b.hour(v);
        }
        if let Some(v) = self.month {
            b = b.month(v);
        }
        if let Some(v) = self.day_of_week {
            b = b.day_of_week(v);
        }
        if let Some(choice) = &self.route_choice {
            b = b.route(RouteNumber::resolve(choice, self.route_manual.as_deref())?);
        }
        b.build()
    }

    pub fn route_is_other(&self) -> bool {
        self.route_choice.as_deref() == Some(crate::types::OTHER_ROUTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_a_record() {
        let r = FormInput::default().to_record().unwrap();
        assert_eq!(r.school_year(), SchoolYear::Y2024);
        assert_eq!(r.students(), 25);
        assert_eq!(r.hour(), 8);
        assert_eq!(r.month(), 5);
        assert_eq!(r.day_of_week(), 2);
        assert!(r.is_rush_hour());
        assert!(!r.is_weekend());
        assert_eq!(r.bus_company(), BusCompany::LAndMBusCorp);
        assert_eq!(r.route().as_str(), "3002A");
        assert!(!r.alerted_opt());
    }

    #[test]
    fn other_route_with_empty_text_passes_empty_string() {
        let input = FormInput {
            route_choice: Some("Other".into()),
            route_manual: Some(String::new()),
            ..FormInput::default()
        };
        assert!(input.route_is_other());
        let r = input.to_record().unwrap();
        assert_eq!(r.route(), &RouteNumber::Manual(String::new()));
    }

    #[test]
    fn missing_widget_is_an_error_not_a_default() {
        let input = FormInput {
            borough: None,
            ..FormInput::default()
        };
        assert_eq!(input.to_record().unwrap_err(), FormError::Missing("Borough"));

        let input = FormInput {
            month: None,
            ..FormInput::default()
        };
        assert_eq!(input.to_record().unwrap_err(), FormError::Missing("Month"));

        let input = FormInput {
            route_choice: None,
            ..FormInput::default()
        };
        assert_eq!(
            input.to_record().unwrap_err(),
            FormError::Missing("Route_Number_Clean")
        );
    }

    #[test]
    fn off_menu_values_are_rejected() {
        let input = FormInput {
            run_type: Some("Night Run".into()),
            ..FormInput::default()
        };
        assert!(matches!(
            input.to_record(),
            Err(FormError::NotInSet { field: "Run_Type", .. })
        ));

        let input = FormInput {
            day_of_week: Some(7),
            ..FormInput::default()
        };
        assert!(matches!(
            input.to_record(),
            Err(FormError::OutOfRange { field: "Day_of_Week", .. })
        ));
    }

    #[test]
    fn parses_json_with_absent_checkboxes() {
        let json = r#"{
            "school_year": "2022-2023", "num_students": 0, "run_type": "Special Ed PM Run",
            "reason": "Won`t Start", "borough": "Staten Island", "hour": 10, "month": 12,
            "day_of_week": 6, "school_age_or_prek": "Pre-K", "bus_company": "Other",
            "route_choice": "Q954", "alerted_opt": true
        }"#;
        let input: FormInput = serde_json::from_str(json).unwrap();
        let r = input.to_record().unwrap();
        assert!(r.is_weekend());
        assert!(!r.is_rush_hour());
        assert!(r.alerted_opt());
        assert!(!r.notified_schools());
        assert_eq!(r.reason(), Reason::WontStart);
    }
}

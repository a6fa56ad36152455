use serde::{Serialize, Serializer};
use std::{fmt, str::FromStr};

use crate::error::FormError;

// ---------- Closed-set fields ----------

macro_rules! categorical {
    (
        $(#[$meta:meta])*
        $name:ident => $column:literal { $($variant:ident = $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Column name in the feature record.
            pub const COLUMN: &'static str = $column;
            /// Every option, in dropdown order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label),+
                }
            }
        }

        // First dropdown entry is preselected.
        impl Default for $name {
            fn default() -> Self {
                Self::ALL[0]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = FormError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label() == s)
                    .ok_or_else(|| FormError::NotInSet {
                        field: $column,
                        value: s.to_string(),
                    })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.label())
            }
        }
    };
}

categorical!(SchoolYear => "School_Year" {
    Y2024 = "2024-2025",
    Y2023 = "2023-2024",
    Y2022 = "2022-2023",
});

categorical!(RunType => "Run_Type" {
    PreKEi = "Pre-K/EI",
    SpecialEdAm = "Special Ed AM Run",
    GeneralEdAm = "General Ed AM Run",
    SpecialEdPm = "Special Ed PM Run",
    GeneralEdPm = "General Ed PM Run",
    GeneralEdFieldTrip = "General Ed Field Trip",
    SpecialEdFieldTrip = "Special Ed Field Trip",
});

categorical!(
    /// Reported cause of the delay or breakdown.
    Reason => "Reason" {
    HeavyTraffic = "Heavy Traffic",
    Other = "Other",
    MechanicalProblem = "Mechanical Problem",
    WontStart = "Won`t Start",
    FlatTire = "Flat Tire",
    ProblemRun = "Problem Run",
    Accident = "Accident",
    LateReturnFromFieldTrip = "Late return from Field Trip",
    WeatherConditions = "Weather Conditions",
    DelayedBySchool = "Delayed by School",
});

categorical!(Borough => "Borough" {
    Brooklyn = "Brooklyn",
    Bronx = "Bronx",
    StatenIsland = "Staten Island",
    Queens = "Queens",
    Manhattan = "Manhattan",
});

categorical!(StudentType => "School_Age_or_PreK" {
    PreK = "Pre-K",
    SchoolAge = "School-Age",
});

categorical!(
    /// Contracted bus operator. `Other` groups the long tail.
    BusCompany => "Bus_Company_Name" {
    LAndMBusCorp = "L & M BUS CORP",
    BoroTransit = "BORO TRANSIT INC",
    PioneerTransportation = "PIONEER TRANSPORTATION CORP",
    PrideTransportation = "PRIDE TRANSPORTATION INC",
    AlliedTransit = "ALLIED TRANSIT CORP",
    ConsolidatedBusTransit = "CONSOLIDATED BUS TRANSIT INC",
    LoganBus = "LOGAN BUS COMPANY INC",
    LittleRichie = "LITTLE RICHIE BUS SERVICE",
    SntBus = "SNT BUS INC",
    DonThomas = "DON THOMAS BUSES INC",
    Other = "Other",
    Lorinda = "LORINDA ENTERPRISES LTD",
    Hoyt = "HOYT TRANSPORTATION CORP",
    Gvc = "G.V.C. LTD",
    PhillipBus = "PHILLIP BUS SERVICE INC",
    VanTrans = "VAN TRANS LLC",
    AllAmerican = "ALL AMERICAN SCHOOL BUS COMPANY",
    EmpireStateBus = "EMPIRE STATE BUS CORP",
    CarefulBus = "CAREFUL BUS SERVICE INC",
    NycUmbrella = "NYC SCHOOL BUS UMBRELLA SERVICES",
    Alina = "ALINA SERVICES CORP",
    EmpireCharter = "EMPIRE CHARTER SERVICE INC",
    Leesel = "LEESEL TRANSPORTATION CORP",
    QualityTransportation = "QUALITY TRANSPORTATION CORP",
});

// ---------- Route number ----------

/// Dropdown entry that unlocks manual route entry.
pub const OTHER_ROUTE: &str = "Other";

/// Historical route identifiers offered in the route dropdown.
pub const ROUTE_CATALOG: &[&str] = &[
    "3002A", "K064", "X184", "R1218", "L343", "Q370", "X028", "P863", "Q742", "R1203", "M1084",
    "M859", "Q664", "P102", "K424", "3406A", "PS200", "R349", "L141", "R1030", "R1303", "Q2901",
    "M154", "L535", "X2359", "Q818", "X049", "M136", "Q337", "R1043", "P584", "P783", "L400",
    "R007", "X560", "R1121", "M124", "M9045", "M626", "X2318", "X112", "P671", "R1324", "R1318",
    "R1078", "K1436", "M798", "P677", "K032", "K972", "3606A", "X2269", "L610", "B0203A", "M729",
    "Q840", "Y136", "X202", "X744", "X2138", "N619", "M884", "PB4", "2B", "X174", "M717", "K1433",
    "K880", "N292", "R1102", "Q3082", "L147", "B0230A", "P893", "Q121", "R001", "K008", "R014",
    "K1412", "R1185", "R032", "K243", "EF4", "B0919Z", "R9091", "P692", "M111", "K642", "P748",
    "Q2994", "P638", "R9063", "Y182", "R9185", "R9198", "R9227", "R9316", "R9164", "R006", "R023",
    "L697", "X175", "R1068", "Q8375", "M1184", "X058", "K012", "M1121", "K1429", "Q388", "X532",
    "3315A", "3318A", "X631", "M116", "P885", "PK1", "Y234", "X099", "Y200", "M1036", "K505",
    "N210", "Q906", "K014", "Y254", "M783", "N035", "B0221A", "Q868", "M956", "K168", "K144",
    "K696", "R9030", "R9043", "R9117", "N563", "K981", "X2034", "2", "B0204A", "R9130", "R9175",
    "R9219", "R1015", "P704", "L747", "K109", "Q954",
];

/// Route_Number_Clean: either a catalog entry or whatever was typed after
/// choosing [`OTHER_ROUTE`]. Only `Manual` can carry a value the encoder has
/// never seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteNumber {
    Catalog(&'static str),
    Manual(String),
}

impl RouteNumber {
    pub const COLUMN: &'static str = "Route_Number_Clean";

    /// Resolves the dropdown choice and the manual text box into a route.
    /// An empty manual entry is kept as the empty string.
    pub fn resolve(choice: &str, manual: Option<&str>) -> Result<Self, FormError> {
        if choice == OTHER_ROUTE {
            return Ok(Self::Manual(manual.unwrap_or_default().to_string()));
        }
        ROUTE_CATALOG
            .iter()
            .copied()
            .find(|r| *r == choice)
            .map(Self::Catalog)
            .ok_or_else(|| FormError::NotInSet {
                field: Self::COLUMN,
                value: choice.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Catalog(r) => r,
            Self::Manual(s) => s,
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Manual(_))
    }
}

impl Default for RouteNumber {
    fn default() -> Self {
        Self::Catalog(ROUTE_CATALOG[0])
    }
}

impl Serialize for RouteNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------- Numeric fields ----------

/// Integer slider: column name, caption and inclusive bounds.
#[derive(Debug, Clone, Copy)]
pub struct Slider {
    pub column: &'static str,
    pub label: &'static str,
    pub min: u8,
    pub max: u8,
    pub default: u8,
}

impl Slider {
    pub fn check(&self, value: i64) -> Result<u8, FormError> {
        if value < i64::from(self.min) || value > i64::from(self.max) {
            return Err(FormError::OutOfRange {
                field: self.column,
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(value as u8)
    }
}

pub const STUDENTS: Slider = Slider {
    column: "Number_Of_Students_On_The_Bus",
    label: "Number of Students on the Bus",
    min: 0,
    max: 80,
    default: 25,
};
pub const HOUR: Slider = Slider {
    column: "Hour",
    label: "Hour of Day",
    min: 0,
    max: 23,
    default: 8,
};
pub const MONTH: Slider = Slider {
    column: "Month",
    label: "Month",
    min: 1,
    max: 12,
    default: 5,
};
pub const DAY_OF_WEEK: Slider = Slider {
    column: "Day_of_Week",
    label: "Day of Week (0=Mon, 6=Sun)",
    min: 0,
    max: 6,
    default: 2,
};

/// Saturday or Sunday, with Monday = 0.
pub fn is_weekend(day_of_week: u8) -> bool {
    matches!(day_of_week, 5 | 6)
}

pub fn is_rush_hour(hour: u8) -> bool {
    matches!(hour, 7..=9 | 15..=17)
}

// ---------- Record ----------

/// One value of the flat record, as the encoder sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Category(&'a str),
    Number(f64),
}

/// The full feature record for one bus run. Built only through
/// [`TripRecordBuilder`]; the two derived flags have no setter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripRecord {
    #[serde(rename = "School_Year")]
    school_year: SchoolYear,
    #[serde(rename = "Number_Of_Students_On_The_Bus")]
    students: u8,
    #[serde(rename = "Run_Type")]
    run_type: RunType,
    #[serde(rename = "Reason")]
    reason: Reason,
    #[serde(rename = "Borough")]
    borough: Borough,
    #[serde(rename = "Hour")]
    hour: u8,
    #[serde(rename = "Month")]
    month: u8,
    #[serde(rename = "Day_of_Week")]
    day_of_week: u8,
    #[serde(rename = "Is_Weekend", serialize_with = "as_flag")]
    is_weekend: bool,
    #[serde(rename = "Is_Rush_Hour", serialize_with = "as_flag")]
    is_rush_hour: bool,
    #[serde(rename = "School_Age_or_PreK")]
    student_type: StudentType,
    #[serde(rename = "Bus_Company_Name")]
    bus_company: BusCompany,
    #[serde(rename = "Route_Number_Clean")]
    route: RouteNumber,
    #[serde(rename = "Contract_Notified_Schools", serialize_with = "as_flag")]
    notified_schools: bool,
    #[serde(rename = "Contract_Notified_Parents", serialize_with = "as_flag")]
    notified_parents: bool,
    #[serde(rename = "Alerted_OPT", serialize_with = "as_flag")]
    alerted_opt: bool,
}

fn as_flag<S: Serializer>(v: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*v))
}

impl TripRecord {
    /// Column order of the assembled record.
    pub const FIELD_NAMES: [&'static str; 16] = [
        "School_Year",
        "Number_Of_Students_On_The_Bus",
        "Run_Type",
        "Reason",
        "Borough",
        "Hour",
        "Month",
        "Day_of_Week",
        "Is_Weekend",
        "Is_Rush_Hour",
        "School_Age_or_PreK",
        "Bus_Company_Name",
        "Route_Number_Clean",
        "Contract_Notified_Schools",
        "Contract_Notified_Parents",
        "Alerted_OPT",
    ];

    /// Columns holding category labels; the rest are numeric or 0/1 flags.
    pub const CATEGORICAL: [&'static str; 7] = [
        "School_Year",
        "Run_Type",
        "Reason",
        "Borough",
        "School_Age_or_PreK",
        "Bus_Company_Name",
        "Route_Number_Clean",
    ];

    pub fn builder() -> TripRecordBuilder {
        TripRecordBuilder::default()
    }

    /// Looks a column up by name. Flags come back as 0/1.
    pub fn field(&self, name: &str) -> Option<FieldValue<'_>> {
        let flag = |b: bool| FieldValue::Number(if b { 1.0 } else { 0.0 });
        let v = match name {
            "School_Year" => FieldValue::Category(self.school_year.label()),
            "Number_Of_Students_On_The_Bus" => FieldValue::Number(f64::from(self.students)),
            "Run_Type" => FieldValue::Category(self.run_type.label()),
            "Reason" => FieldValue::Category(self.reason.label()),
            "Borough" => FieldValue::Category(self.borough.label()),
            "Hour" => FieldValue::Number(f64::from(self.hour)),
            "Month" => FieldValue::Number(f64::from(self.month)),
            "Day_of_Week" => FieldValue::Number(f64::from(self.day_of_week)),
            "Is_Weekend" => flag(self.is_weekend),
            "Is_Rush_Hour" => flag(self.is_rush_hour),
            "School_Age_or_PreK" => FieldValue::Category(self.student_type.label()),
            "Bus_Company_Name" => FieldValue::Category(self.bus_company.label()),
            "Route_Number_Clean" => FieldValue::Category(self.route.as_str()),
            "Contract_Notified_Schools" => flag(self.notified_schools),
            "Contract_Notified_Parents" => flag(self.notified_parents),
            "Alerted_OPT" => flag(self.alerted_opt),
            _ => return None,
        };
        Some(v)
    }

    pub fn school_year(&self) -> SchoolYear {
        self.school_year
    }
    pub fn students(&self) -> u8 {
        self.students
    }
    pub fn run_type(&self) -> RunType {
        self.run_type
    }
    pub fn reason(&self) -> Reason {
        self.reason
    }
    pub fn borough(&self) -> Borough {
        self.borough
    }
    pub fn hour(&self) -> u8 {
        self.hour
    }
    pub fn month(&self) -> u8 {
        self.month
    }
    pub fn day_of_week(&self) -> u8 {
        self.day_of_week
    }
    pub fn is_weekend(&self) -> bool {
        self.is_weekend
    }
    pub fn is_rush_hour(&self) -> bool {
        self.is_rush_hour
    }
    pub fn student_type(&self) -> StudentType {
        self.student_type
    }
    pub fn bus_company(&self) -> BusCompany {
        self.bus_company
    }
    pub fn route(&self) -> &RouteNumber {
        &self.route
    }
    pub fn notified_schools(&self) -> bool {
        self.notified_schools
    }
    pub fn notified_parents(&self) -> bool {
        self.notified_parents
    }
    pub fn alerted_opt(&self) -> bool {
        self.alerted_opt
    }
}

/// Accumulates widget values; `build` checks that every field is present and
/// in range, then derives the weekend and rush-hour flags.
#[derive(Debug, Clone, Default)]
pub struct TripRecordBuilder {
    school_year: Option<SchoolYear>,
    students: Option<i64>,
    run_type: Option<RunType>,
    reason: Option<Reason>,
    borough: Option<Borough>,
    hour: Option<i64>,
    month: Option<i64>,
    day_of_week: Option<i64>,
    student_type: Option<StudentType>,
    bus_company: Option<BusCompany>,
    route: Option<RouteNumber>,
    notified_schools: bool,
    notified_parents: bool,
    alerted_opt: bool,
}

impl TripRecordBuilder {
    pub fn school_year(mut self, v: SchoolYear) -> Self {
        self.school_year = Some(v);
        self
    }
    pub fn students(mut self, v: i64) -> Self {
        self.students = Some(v);
        self
    }
    pub fn run_type(mut self, v: RunType) -> Self {
        self.run_type = Some(v);
        self
    }
    pub fn reason(mut self, v: Reason) -> Self {
        self.reason = Some(v);
        self
    }
    pub fn borough(mut self, v: Borough) -> Self {
        self.borough = Some(v);
        self
    }
    pub fn hour(mut self, v: i64) -> Self {
        self.hour = Some(v);
        self
    }
    pub fn month(mut self, v: i64) -> Self {
        self.month = Some(v);
        self
    }
    pub fn day_of_week(mut self, v: i64) -> Self {
        self.day_of_week = Some(v);
        self
    }
    pub fn student_type(mut self, v: StudentType) -> Self {
        self.student_type = Some(v);
        self
    }
    pub fn bus_company(mut self, v: BusCompany) -> Self {
        self.bus_company = Some(v);
        self
    }
    pub fn route(mut self, v: RouteNumber) -> Self {
        self.route = Some(v);
        self
    }
    pub fn notified_schools(mut self, v: bool) -> Self {
        self.notified_schools = v;
        self
    }
    pub fn notified_parents(mut self, v: bool) -> Self {
        self.notified_parents = v;
        self
    }
    pub fn alerted_opt(mut self, v: bool) -> Self {
        self.alerted_opt = v;
        self
    }

    pub fn build(self) -> Result<TripRecord, FormError> {
        let hour = HOUR.check(self.hour.ok_or(FormError::Missing(HOUR.column))?)?;
        let day_of_week =
            DAY_OF_WEEK.check(self.day_of_week.ok_or(FormError::Missing(DAY_OF_WEEK.column))?)?;

        Ok(TripRecord {
            school_year: self.school_year.ok_or(FormError::Missing(SchoolYear::COLUMN))?,
            students: STUDENTS.check(self.students.ok_or(FormError::Missing(STUDENTS.column))?)?,
            run_type: self.run_type.ok_or(FormError::Missing(RunType::COLUMN))?,
            reason: self.reason.ok_or(FormError::Missing(Reason::COLUMN))?,
            borough: self.borough.ok_or(FormError::Missing(Borough::COLUMN))?,
            hour,
            month: MONTH.check(self.month.ok_or(FormError::Missing(MONTH.column))?)?,
            day_of_week,
            is_weekend: is_weekend(day_of_week),
            is_rush_hour: is_rush_hour(hour),
            student_type: self.student_type.ok_or(FormError::Missing(StudentType::COLUMN))?,
            bus_company: self.bus_company.ok_or(FormError::Missing(BusCompany::COLUMN))?,
            route: self.route.ok_or(FormError::Missing(RouteNumber::COLUMN))?,
            notified_schools: self.notified_schools,
            notified_parents: self.notified_parents,
            alerted_opt: self.alerted_opt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full(hour: i64, day: i64) -> TripRecordBuilder {
        TripRecord::builder()
            .school_year(SchoolYear::Y2024)
            .students(25)
            .run_type(RunType::GeneralEdAm)
            .reason(Reason::HeavyTraffic)
            .borough(Borough::Queens)
            .hour(hour)
            .month(5)
            .day_of_week(day)
            .student_type(StudentType::SchoolAge)
            .bus_company(BusCompany::Other)
            .route(RouteNumber::Catalog("K064"))
    }

    #[test]
    fn derived_flags_follow_hour_and_day() {
        for hour in 0..=23 {
            for day in 0..=6 {
                let r = full(hour, day).build().unwrap();
                assert_eq!(r.is_weekend(), day == 5 || day == 6);
                assert_eq!(r.is_rush_hour(), [7, 8, 9, 15, 16, 17].contains(&hour));
            }
        }
    }

    #[test]
    fn rush_hour_weekday_scenarios() {
        let r = full(8, 2).build().unwrap();
        assert!(!r.is_weekend());
        assert!(r.is_rush_hour());

        let r = full(10, 6).build().unwrap();
        assert!(r.is_weekend());
        assert!(!r.is_rush_hour());
    }

    #[test]
    fn build_reports_first_missing_field() {
        let err = TripRecord::builder().hour(8).day_of_week(2).build().unwrap_err();
        assert_eq!(err, FormError::Missing("School_Year"));

        let err = TripRecord::builder().build().unwrap_err();
        assert_eq!(err, FormError::Missing("Hour"));
    }

    #[test]
    fn out_of_range_slider_is_rejected() {
        let err = full(24, 2).build().unwrap_err();
        assert!(matches!(err, FormError::OutOfRange { field: "Hour", value: 24, .. }));

        let err = full(8, 2).month(0).build().unwrap_err();
        assert!(matches!(err, FormError::OutOfRange { field: "Month", .. }));

        let err = full(8, 2).students(81).build().unwrap_err();
        assert!(matches!(err, FormError::OutOfRange { max: 80, .. }));
    }

    #[test]
    fn categorical_parse_uses_exact_labels() {
        assert_eq!("Won`t Start".parse::<Reason>().unwrap(), Reason::WontStart);
        assert_eq!("G.V.C. LTD".parse::<BusCompany>().unwrap(), BusCompany::Gvc);
        assert_eq!(BusCompany::ALL.len(), 24);
        assert_eq!(Reason::ALL.len(), 10);
        assert_eq!(RunType::ALL.len(), 7);

        let err = "brooklyn".parse::<Borough>().unwrap_err();
        assert_eq!(
            err,
            FormError::NotInSet {
                field: "Borough",
                value: "brooklyn".into()
            }
        );
    }

    #[test]
    fn route_resolution() {
        assert_eq!(RouteNumber::resolve("X184", None).unwrap(), RouteNumber::Catalog("X184"));
        assert_eq!(
            RouteNumber::resolve("Other", Some("Z999")).unwrap(),
            RouteNumber::Manual("Z999".into())
        );
        // Empty manual text flows through untouched.
        let r = RouteNumber::resolve("Other", None).unwrap();
        assert_eq!(r.as_str(), "");
        assert!(r.is_manual());
        // Typed text is ignored unless the sentinel is chosen.
        assert_eq!(RouteNumber::resolve("K064", Some("junk")).unwrap().as_str(), "K064");
        assert!(RouteNumber::resolve("NOPE", None).is_err());
    }

    #[test]
    fn record_fields_in_column_order() {
        let r = full(8, 2).alerted_opt(true).build().unwrap();
        for name in TripRecord::FIELD_NAMES {
            assert!(r.field(name).is_some(), "{name} not exposed");
        }
        assert_eq!(r.field("Alerted_OPT"), Some(FieldValue::Number(1.0)));
        assert_eq!(r.field("Contract_Notified_Parents"), Some(FieldValue::Number(0.0)));
        assert_eq!(r.field("Borough"), Some(FieldValue::Category("Queens")));
        assert_eq!(r.field("Bogus"), None);
    }

    #[test]
    fn record_serializes_with_column_names() {
        let r = full(8, 6).route(RouteNumber::Manual(String::new())).build().unwrap();
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["Route_Number_Clean"], "");
        assert_eq!(v["Is_Weekend"], 1);
        assert_eq!(v["Is_Rush_Hour"], 1);
        assert_eq!(v["Alerted_OPT"], 0);
        assert_eq!(v["School_Year"], "2024-2025");
        assert_eq!(v.as_object().unwrap().len(), 16);
    }
}

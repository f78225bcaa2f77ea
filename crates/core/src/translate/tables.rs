//! Declarative field-translation tables.
//!
//! Every canonical attribute maps to one Bitrix user field on the deal side
//! and a differently named field on the quote side, and several quote-side
//! fields derive from the fetched deal snapshot through fixed numeric
//! remaps. All of that lives here as data; `engine` only walks these tables.

/// Which of the two outbound payload shapes a mapping targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Deal,
    Quote,
}

/// Product categorization for the per-area product lists: three named
/// business units plus a catch-all services bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AreaCategory {
    Unau,
    Unai,
    Unva,
    Services,
}

impl AreaCategory {
    pub const ALL: [AreaCategory; 4] =
        [AreaCategory::Unau, AreaCategory::Unai, AreaCategory::Unva, AreaCategory::Services];

    pub fn matches(self, business_unit: &str) -> bool {
        match self {
            Self::Unau => business_unit == "UNAU",
            Self::Unai => business_unit == "UNAI",
            Self::Unva => business_unit == "UNVA",
            Self::Services => !matches!(business_unit, "UNAU" | "UNAI" | "UNVA"),
        }
    }

    pub fn field(self, side: Side) -> &'static str {
        match (self, side) {
            (Self::Unau, Side::Deal) => "UF_CRM_1579309558",
            (Self::Unai, Side::Deal) => "UF_CRM_1579308051",
            (Self::Unva, Side::Deal) => "UF_CRM_1579309681",
            (Self::Services, Side::Deal) => "UF_CRM_5716A1B71750E",
            (Self::Unau, Side::Quote) => "UF_CRM_1579310551",
            (Self::Unai, Side::Quote) => "UF_CRM_1579310442",
            (Self::Unva, Side::Quote) => "UF_CRM_1579310649",
            (Self::Services, Side::Quote) => "UF_CRM_1444015918",
        }
    }
}

/// Deal-side enumeration codes per named business unit. Quote-side codes
/// are derived through `remap_department` / `remap_summary`, never stored.
#[derive(Clone, Copy, Debug)]
pub struct UnitCodes {
    pub unit: &'static str,
    pub department_deal: i64,
    pub summary_deal: i64,
}

pub const UNIT_CODES: &[UnitCodes] = &[
    UnitCodes { unit: "UNAU", department_deal: 2075, summary_deal: 464 },
    UnitCodes { unit: "UNAI", department_deal: 2079, summary_deal: 466 },
    UnitCodes { unit: "UNVA", department_deal: 2087, summary_deal: 468 },
];

/// Department code for products outside the named units.
pub const SERVICES_DEPARTMENT_DEAL: i64 = 2093;

/// Quote-side department enumeration: constant +6 with one special case.
pub fn remap_department(code: i64) -> i64 {
    if code == 2087 {
        code + 2
    } else {
        code + 6
    }
}

/// Business-unit summary list uses a constant per-side offset.
pub fn remap_summary(code: i64) -> i64 {
    code + 6
}

/// Origin enumeration: three pinned pairs, then +2 above 1200, +40 below.
pub fn remap_origin(code: i64) -> i64 {
    match code {
        1261 => 1265,
        1701 => 1705,
        1263 => 1165,
        _ if code > 1200 => code + 2,
        _ => code + 40,
    }
}

/// Services area list carries the widest spread of enumeration ranges.
pub fn remap_services_area(code: i64) -> i64 {
    if code == 2095 {
        code + 2
    } else if code > 2000 {
        code + 8
    } else if code == 530 || code == 532 {
        code - 167
    } else {
        code - 169
    }
}

fn offset_down_169(code: i64) -> i64 {
    code - 169
}

/// How a deal-snapshot field is carried into the create-branch quote
/// payload.
#[derive(Clone, Copy, Debug)]
pub enum Transform {
    /// Verbatim copy of the snapshot value.
    Copy,
    /// Parse as integer, add the offset.
    OffsetScalar(i64),
    /// Apply the remap to each element of a list value; non-list values
    /// pass through untouched.
    MapList(fn(i64) -> i64),
}

#[derive(Clone, Copy, Debug)]
pub struct DealToQuoteRule {
    pub deal_field: &'static str,
    pub quote_field: &'static str,
    pub transform: Transform,
}

const fn rule(
    deal_field: &'static str,
    quote_field: &'static str,
    transform: Transform,
) -> DealToQuoteRule {
    DealToQuoteRule { deal_field, quote_field, transform }
}

/// Create-branch derivation of the quote payload from the fetched deal.
/// The offsets and special cases here are wire constants of the remote
/// enumerations and must not be re-derived inline anywhere else.
pub const DEAL_TO_QUOTE_RULES: &[DealToQuoteRule] = &[
    rule("TITLE", "TITLE", Transform::Copy),
    rule("CURRENCY_ID", "CURRENCY_ID", Transform::Copy),
    rule("COMPANY_ID", "COMPANY_ID", Transform::Copy),
    rule("CONTACT_ID", "CONTACT_ID", Transform::Copy),
    rule("BEGINDATE", "BEGINDATE", Transform::Copy),
    rule("CLOSEDATE", "CLOSEDATE", Transform::Copy),
    rule("ASSIGNED_BY_ID", "ASSIGNED_BY_ID", Transform::Copy),
    rule("UTM_SOURCE", "UTM_SOURCE", Transform::Copy),
    rule("UTM_MEDIUM", "UTM_MEDIUM", Transform::Copy),
    rule("UTM_CAMPAIGN", "UTM_CAMPAIGN", Transform::Copy),
    rule("UTM_CONTENT", "UTM_CONTENT", Transform::Copy),
    rule("UTM_TERM", "UTM_TERM", Transform::Copy),
    rule("LEAD_ID", "LEAD_ID", Transform::Copy),
    // principal / secondary owner, shared commission
    rule("UF_CRM_1672642957", "UF_CRM_1672643073", Transform::Copy),
    rule("UF_CRM_1672643001", "UF_CRM_1672643100", Transform::Copy),
    rule("UF_CRM_1672643298", "UF_CRM_1672643342", Transform::Copy),
    // end-client company, marketing campaign
    rule("UF_CRM_1655413285", "UF_CRM_62AB9AAFA8FE1", Transform::Copy),
    rule("UF_CRM_1579190263", "UF_CRM_1579190330", Transform::Copy),
    rule("UF_CRM_5716A1B70005A", "UF_CRM_5611E9B1B1870", Transform::OffsetScalar(-169)),
    rule("UF_CRM_5716A1B709633", "UF_CRM_5611E9B1C3BD5", Transform::Copy),
    rule("UF_CRM_1531171994", "UF_CRM_5B43D5CD2195D", Transform::MapList(remap_origin)),
    rule("UF_CRM_5716A1B6EA8CF", "UF_CRM_5611E9B18B540", Transform::MapList(offset_down_169)),
    rule("UF_CRM_1579123522", "UF_CRM_1579123526", Transform::MapList(remap_summary)),
    rule("UF_CRM_1503584748", "UF_CRM_599F061D53C4B", Transform::OffsetScalar(32)),
    rule("UF_CRM_1444152618", "UF_CRM_561405881EE7D", Transform::MapList(remap_department)),
    rule("UF_CRM_5716A1B71750E", "UF_CRM_1444015918", Transform::MapList(remap_services_area)),
    rule("UF_CRM_1444016101", "UF_CRM_5611F0F434963", Transform::Copy),
    rule("UF_CRM_1596601522", "UF_CRM_5F2A353D3EE36", Transform::Copy),
    rule("UF_CRM_1579702489", "UF_CRM_1579702544", Transform::Copy),
    rule("UF_CRM_1522157323", "UF_CRM_5ABA80EAD4C53", Transform::Copy),
];

/// Field ids for one canonical attribute on each payload side. `None`
/// means the attribute has no field on that side.
#[derive(Clone, Copy, Debug)]
pub struct CanonicalField {
    pub canonical: &'static str,
    pub deal_field: Option<&'static str>,
    pub quote_field: Option<&'static str>,
}

impl CanonicalField {
    pub fn on(&self, side: Side) -> Option<&'static str> {
        match side {
            Side::Deal => self.deal_field,
            Side::Quote => self.quote_field,
        }
    }
}

const fn field(
    canonical: &'static str,
    deal_field: Option<&'static str>,
    quote_field: Option<&'static str>,
) -> CanonicalField {
    CanonicalField { canonical, deal_field, quote_field }
}

pub const RUBRIC: CanonicalField =
    field("rubric", Some("UF_CRM_5716A1B729B20"), Some("UF_CRM_1444241279"));
pub const PROFIT_RATIO: CanonicalField =
    field("profit_ratio", Some("UF_CRM_1672638903"), Some("UF_CRM_1672639032"));
pub const DEPARTMENTS: CanonicalField =
    field("departments", Some("UF_CRM_1444152618"), Some("UF_CRM_561405881EE7D"));
pub const MULTI_DEPARTMENT: CanonicalField =
    field("multi_department", Some("UF_CRM_1579702489"), Some("UF_CRM_1579702544"));
pub const UNIT_SUMMARY: CanonicalField =
    field("unit_summary", Some("UF_CRM_1579123522"), Some("UF_CRM_1579123526"));
pub const ASSIGNED: CanonicalField =
    field("assigned", Some("ASSIGNED_BY_ID"), Some("ASSIGNED_BY_ID"));
pub const CLOSE_DATE: CanonicalField = field("close_date", Some("CLOSEDATE"), Some("CLOSEDATE"));
pub const PREPARERS: CanonicalField = field("preparers", None, Some("UF_CRM_1579118591"));
pub const APPROVER: CanonicalField = field("approver", None, Some("UF_CRM_1444016304"));
pub const OFFER_NAME: CanonicalField = field("offer_name", None, Some("UF_CRM_1443821741"));
pub const MAIL_DATE: CanonicalField = field("mail_date", None, Some("UF_CRM_1579310925"));
pub const START_DATE: CanonicalField = field("start_date", None, Some("UF_CRM_1579191342"));
pub const SEND_DATE: CanonicalField = field("send_date", None, Some("UF_CRM_1444014615"));

pub const FIELD_IDS: &[CanonicalField] = &[
    RUBRIC,
    PROFIT_RATIO,
    DEPARTMENTS,
    MULTI_DEPARTMENT,
    UNIT_SUMMARY,
    ASSIGNED,
    CLOSE_DATE,
    PREPARERS,
    APPROVER,
    OFFER_NAME,
    MAIL_DATE,
    START_DATE,
    SEND_DATE,
];

/// Optional cost attributes, emitted only when non-zero.
#[derive(Clone, Copy, Debug)]
pub struct CostField {
    pub canonical: &'static str,
    pub deal_field: &'static str,
    pub quote_field: &'static str,
}

pub const COST_FIELDS: &[CostField] = &[
    CostField {
        canonical: "cost_auma",
        deal_field: "UF_CRM_1470168697",
        quote_field: "UF_CRM_57A0FECB87D98",
    },
    CostField {
        canonical: "cost_msa",
        deal_field: "UF_CRM_1536612671",
        quote_field: "UF_CRM_1536612809",
    },
    CostField {
        canonical: "cost_valmet",
        deal_field: "UF_CRM_1672640891",
        quote_field: "UF_CRM_1672641073",
    },
];

impl CostField {
    pub fn on(&self, side: Side) -> &'static str {
        match side {
            Side::Deal => self.deal_field,
            Side::Quote => self.quote_field,
        }
    }
}

/// Quote field projected by the existence lookup and matched against the
/// canonical offer name.
pub const QUOTE_NAME_TAG_FIELD: &str = "UF_CRM_1443821741";

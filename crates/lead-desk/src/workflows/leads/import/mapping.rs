use super::normalizer::normalize_header;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Canonical import columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LeadField {
    FirstName,
    LastName,
    Phone,
    Email,
    Address,
    City,
    State,
    Zip,
    PlanName,
    TotalPlanCost,
    MonthlyPayment,
    TermMonths,
}

impl LeadField {
    pub(crate) const REQUIRED: [LeadField; 5] = [
        LeadField::FirstName,
        LeadField::LastName,
        LeadField::Phone,
        LeadField::Email,
        LeadField::TotalPlanCost,
    ];

    pub(crate) const fn label(self) -> &'static str {
        match self {
            LeadField::FirstName => "first_name",
            LeadField::LastName => "last_name",
            LeadField::Phone => "phone",
            LeadField::Email => "email",
            LeadField::Address => "address",
            LeadField::City => "city",
            LeadField::State => "state",
            LeadField::Zip => "zip",
            LeadField::PlanName => "plan_name",
            LeadField::TotalPlanCost => "total_plan_cost",
            LeadField::MonthlyPayment => "monthly_payment",
            LeadField::TermMonths => "term_months",
        }
    }
}

static HEADER_MAP: OnceLock<HashMap<String, LeadField>> = OnceLock::new();

pub(crate) fn field_for_header(header: &str) -> Option<LeadField> {
    header_map().get(&normalize_header(header)).copied()
}

fn header_map() -> &'static HashMap<String, LeadField> {
    HEADER_MAP.get_or_init(|| {
        const HEADER_TO_FIELD: &[(&str, LeadField)] = &[
            ("first_name", LeadField::FirstName),
            ("fname", LeadField::FirstName),
            ("first", LeadField::FirstName),
            ("customer_first_name", LeadField::FirstName),
            ("last_name", LeadField::LastName),
            ("lname", LeadField::LastName),
            ("last", LeadField::LastName),
            ("surname", LeadField::LastName),
            ("customer_last_name", LeadField::LastName),
            ("phone", LeadField::Phone),
            ("phone_number", LeadField::Phone),
            ("primary_phone", LeadField::Phone),
            ("mobile", LeadField::Phone),
            ("cell", LeadField::Phone),
            ("telephone", LeadField::Phone),
            ("email", LeadField::Email),
            ("email_address", LeadField::Email),
            ("e-mail", LeadField::Email),
            ("address", LeadField::Address),
            ("address1", LeadField::Address),
            ("street", LeadField::Address),
            ("street_address", LeadField::Address),
            ("city", LeadField::City),
            ("state", LeadField::State),
            ("province", LeadField::State),
            ("zip", LeadField::Zip),
            ("zip_code", LeadField::Zip),
            ("postal_code", LeadField::Zip),
            ("plan", LeadField::PlanName),
            ("plan_name", LeadField::PlanName),
            ("plan_type", LeadField::PlanName),
            ("total_plan_cost", LeadField::TotalPlanCost),
            ("total_cost", LeadField::TotalPlanCost),
            ("plan_cost", LeadField::TotalPlanCost),
            ("total_price", LeadField::TotalPlanCost),
            ("monthly_payment", LeadField::MonthlyPayment),
            ("monthly", LeadField::MonthlyPayment),
            ("term_months", LeadField::TermMonths),
            ("term", LeadField::TermMonths),
        ];

        HEADER_TO_FIELD
            .iter()
            .map(|(header, field)| (normalize_header(header), *field))
            .collect()
    })
}

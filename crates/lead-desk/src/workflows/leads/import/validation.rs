use std::collections::HashMap;

use super::mapping::{field_for_header, LeadField};
use super::normalizer::{clean_text, normalize_email, normalize_phone, parse_cents};
use super::parser::RawLeadRow;
use crate::workflows::leads::domain::{ContactDetails, PlanDetails};

/// Typed lead payload that passed every row check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedLead {
    pub(crate) contact: ContactDetails,
    pub(crate) plan: PlanDetails,
}

impl ValidatedLead {
    /// Same normalized phone and email means the same customer.
    pub(crate) fn dedupe_key(&self) -> (String, String) {
        (self.contact.phone.clone(), self.contact.email.clone())
    }
}

/// Turn one raw row into a typed lead, or a single reason string listing
/// every problem found.
pub(crate) fn validate_row(row: &RawLeadRow) -> Result<ValidatedLead, String> {
    let values = mapped_values(row);
    let get = |field: LeadField| values.get(&field).map(String::as_str);

    let missing: Vec<&str> = LeadField::REQUIRED
        .iter()
        .filter(|field| get(**field).is_none())
        .map(|field| field.label())
        .collect();

    let mut problems = Vec::new();
    if !missing.is_empty() {
        problems.push(format!("missing required field(s): {}", missing.join(", ")));
    }

    let contact = ContactDetails {
        first_name: get(LeadField::FirstName).unwrap_or_default().to_string(),
        last_name: get(LeadField::LastName).unwrap_or_default().to_string(),
        phone: get(LeadField::Phone).unwrap_or_default().to_string(),
        email: get(LeadField::Email).unwrap_or_default().to_string(),
        address: get(LeadField::Address).map(str::to_string),
        city: get(LeadField::City).map(str::to_string),
        state: get(LeadField::State).map(str::to_string),
        zip: get(LeadField::Zip).map(str::to_string),
    };

    let contact = match check_contact_formats(contact) {
        Ok(contact) => Some(contact),
        Err(mut found) => {
            problems.append(&mut found);
            None
        }
    };

    let total_plan_cost_cents = get(LeadField::TotalPlanCost).and_then(|raw| {
        let cents = parse_cents(raw);
        match cents {
            Some(cents) if cents >= 0 => Some(cents),
            _ => {
                problems.push(format!("total_plan_cost must be a non-negative amount (found '{raw}')"));
                None
            }
        }
    });

    let monthly_payment_cents = match get(LeadField::MonthlyPayment) {
        Some(raw) => match parse_cents(raw) {
            Some(cents) if cents >= 0 => Some(cents),
            _ => {
                problems.push(format!("monthly_payment must be a non-negative amount (found '{raw}')"));
                None
            }
        },
        None => None,
    };

    let term_months = match get(LeadField::TermMonths) {
        Some(raw) => match raw.parse::<u32>() {
            Ok(months) if months > 0 => Some(months),
            _ => {
                problems.push(format!("term_months must be a positive whole number (found '{raw}')"));
                None
            }
        },
        None => None,
    };

    match (contact, total_plan_cost_cents) {
        (Some(contact), Some(total_plan_cost_cents)) if problems.is_empty() => Ok(ValidatedLead {
            contact,
            plan: PlanDetails {
                plan_name: get(LeadField::PlanName).map(str::to_string),
                total_plan_cost_cents,
                monthly_payment_cents,
                term_months,
            },
        }),
        _ => Err(problems.join("; ")),
    }
}

/// Checks shared by imported rows and manual entry. Missing values are
/// reported by the caller, so empty fields are skipped here.
pub(crate) fn check_contact_formats(contact: ContactDetails) -> Result<ContactDetails, Vec<String>> {
    let mut problems = Vec::new();

    let phone = if contact.phone.is_empty() {
        String::new()
    } else {
        normalize_phone(&contact.phone).unwrap_or_else(|| {
            problems.push(format!("invalid phone number '{}'", contact.phone));
            String::new()
        })
    };

    let email = if contact.email.is_empty() {
        String::new()
    } else {
        normalize_email(&contact.email).unwrap_or_else(|| {
            problems.push(format!("invalid email address '{}'", contact.email));
            String::new()
        })
    };

    if !problems.is_empty() {
        return Err(problems);
    }

    Ok(ContactDetails {
        phone,
        email,
        ..contact
    })
}

/// Validate a manually entered lead: every required value present and well formed.
pub(crate) fn validate_manual(
    contact: ContactDetails,
    plan: PlanDetails,
) -> Result<(ContactDetails, PlanDetails), String> {
    let contact = ContactDetails {
        first_name: clean_text(&contact.first_name),
        last_name: clean_text(&contact.last_name),
        phone: contact.phone.trim().to_string(),
        email: contact.email.trim().to_string(),
        ..contact
    };

    let mut problems = Vec::new();
    let missing: Vec<&str> = [
        (LeadField::FirstName, contact.first_name.is_empty()),
        (LeadField::LastName, contact.last_name.is_empty()),
        (LeadField::Phone, contact.phone.is_empty()),
        (LeadField::Email, contact.email.is_empty()),
    ]
    .into_iter()
    .filter(|(_, empty)| *empty)
    .map(|(field, _)| field.label())
    .collect();
    if !missing.is_empty() {
        problems.push(format!("missing required field(s): {}", missing.join(", ")));
    }
    if plan.total_plan_cost_cents < 0 {
        problems.push("total_plan_cost must be a non-negative amount".to_string());
    }

    match check_contact_formats(contact) {
        Ok(contact) if problems.is_empty() => Ok((contact, plan)),
        Ok(_) => Err(problems.join("; ")),
        Err(mut found) => {
            problems.append(&mut found);
            Err(problems.join("; "))
        }
    }
}

fn mapped_values(row: &RawLeadRow) -> HashMap<LeadField, String> {
    let mut values = HashMap::new();
    for (header, value) in &row.fields {
        let Some(field) = field_for_header(header) else {
            continue;
        };
        let value = clean_text(value);
        if value.is_empty() {
            continue;
        }
        values.entry(field).or_insert(value);
    }
    values
}

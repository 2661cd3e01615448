use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::PricingConfig;
use crate::models::{Course, Enrolment};

/// Fees fixed at submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub course_fee: Decimal,
    pub registration_fee: Decimal,
    pub is_early_bird: bool,
    /// Regular price at the time, kept when the early bird price applied.
    pub original_price: Option<Decimal>,
}

pub fn quote(course: &Course, is_new_student: bool, today: NaiveDate) -> Quote {
    let is_early_bird = course.is_early_bird_available(today);
    Quote {
        course_fee: course.applicable_price(today),
        registration_fee: if is_new_student {
            course.registration_fee_or_zero()
        } else {
            Decimal::ZERO
        },
        is_early_bird,
        original_price: is_early_bird.then_some(course.price),
    }
}

/// Whether confirming `enrolment` on `today` needs an explicit price choice:
/// it was quoted early bird, that deadline has now passed, and the quoted fee
/// no longer matches the course's regular price.
pub fn needs_price_decision(enrolment: &Enrolment, course: &Course, today: NaiveDate) -> bool {
    enrolment.is_early_bird
        && course.early_bird_deadline.is_some_and(|deadline| deadline < today)
        && enrolment.course_fee != course.price
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceCheck {
    pub enrolment_id: i64,
    pub decision_required: bool,
    pub is_early_bird: bool,
    pub early_bird_deadline: Option<NaiveDate>,
    pub quoted_price: Decimal,
    pub regular_price: Decimal,
    pub difference: Decimal,
}

pub fn price_check(enrolment: &Enrolment, course: &Course, today: NaiveDate) -> PriceCheck {
    PriceCheck {
        enrolment_id: enrolment.id,
        decision_required: needs_price_decision(enrolment, course, today),
        is_early_bird: enrolment.is_early_bird,
        early_bird_deadline: course.early_bird_deadline,
        quoted_price: enrolment.course_fee,
        regular_price: course.price,
        difference: course.price - enrolment.course_fee,
    }
}

/// `$120.00 (inc GST)` style label.
pub fn format_price(amount: Decimal, pricing: &PricingConfig) -> String {
    let suffix = if pricing.prices_include_gst { "inc" } else { "ex" };
    format!("${:.2} ({} {})", amount, suffix, pricing.gst_label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        CourseStatus, CourseType, EnrolmentStatus, RegistrationStatus, RepeatPattern,
        SourceChannel, StudentMatch, SubmissionRecord, SUBMISSION_SCHEMA_VERSION,
    };
    use crate::models::student::ContactOwner;
    use chrono::{NaiveTime, Utc};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn course() -> Course {
        Course {
            id: 3,
            name: "Piano".to_string(),
            description: String::new(),
            short_description: String::new(),
            course_type: CourseType::Private,
            status: CourseStatus::Published,
            price: Decimal::new(150, 0),
            early_bird_price: Some(Decimal::new(120, 0)),
            early_bird_deadline: Some(date(2026, 3, 1)),
            registration_fee: Some(Decimal::new(30, 0)),
            start_date: date(2026, 3, 10),
            end_date: Some(date(2026, 6, 10)),
            repeat_pattern: RepeatPattern::Weekly,
            weekday: None,
            start_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            duration_minutes: 45,
            vacancy: 8,
            is_online_bookable: true,
            enrolment_deadline: None,
            teacher_id: None,
            facility_id: None,
            classroom_id: None,
            external_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn enrolment(course_fee: Decimal, is_early_bird: bool) -> Enrolment {
        Enrolment {
            id: 11,
            student_id: 1,
            course_id: 3,
            class_id: None,
            status: EnrolmentStatus::Pending,
            registration_status: RegistrationStatus::New,
            source_channel: SourceChannel::Website,
            course_fee,
            registration_fee: Decimal::ZERO,
            is_early_bird,
            original_price: None,
            student_match: StudentMatch::Created,
            submission: SubmissionRecord {
                schema_version: SUBMISSION_SCHEMA_VERSION,
                submission_id: Uuid::new_v4(),
                submitted_at: Utc::now(),
                channel: SourceChannel::Website,
                course_id: 3,
                class_id: None,
                first_name: "Ada".to_string(),
                last_name: "Lee".to_string(),
                date_of_birth: date(2000, 1, 1),
                email: "ada@example.com".to_string(),
                phone: "0400000000".to_string(),
                contact_owner: ContactOwner::Student,
                guardian_name: None,
                address: None,
                student_match: StudentMatch::Created,
                match_candidates: Vec::new(),
                price_adjustment: None,
            },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_quote_on_deadline_is_early_bird() {
        let q = quote(&course(), true, date(2026, 3, 1));
        assert!(q.is_early_bird);
        assert_eq!(q.course_fee, Decimal::new(120, 0));
        assert_eq!(q.original_price, Some(Decimal::new(150, 0)));
        assert_eq!(q.registration_fee, Decimal::new(30, 0));
    }

    #[test]
    fn test_quote_after_deadline_is_regular() {
        let q = quote(&course(), false, date(2026, 3, 2));
        assert!(!q.is_early_bird);
        assert_eq!(q.course_fee, Decimal::new(150, 0));
        assert_eq!(q.original_price, None);
        assert_eq!(q.registration_fee, Decimal::ZERO);
    }

    #[test]
    fn test_decision_needed_only_after_lapse() {
        let c = course();
        let e = enrolment(Decimal::new(120, 0), true);
        assert!(!needs_price_decision(&e, &c, date(2026, 3, 1)));
        assert!(needs_price_decision(&e, &c, date(2026, 3, 2)));

        let regular = enrolment(Decimal::new(150, 0), false);
        assert!(!needs_price_decision(&regular, &c, date(2026, 4, 1)));
    }

    #[test]
    fn test_price_check_reports_both_options() {
        let check = price_check(&enrolment(Decimal::new(120, 0), true), &course(), date(2026, 3, 5));
        assert!(check.decision_required);
        assert_eq!(check.quoted_price, Decimal::new(120, 0));
        assert_eq!(check.regular_price, Decimal::new(150, 0));
        assert_eq!(check.difference, Decimal::new(30, 0));
    }

    #[test]
    fn test_format_price_labels_gst() {
        let mut pricing = PricingConfig::default();
        assert_eq!(format_price(Decimal::new(12000, 2), &pricing), "$120.00 (inc GST)");
        pricing.prices_include_gst = false;
        assert_eq!(format_price(Decimal::new(99, 0), &pricing), "$99.00 (ex GST)");
    }
}

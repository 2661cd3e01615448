//! Storefront listing content built from a course.

use chrono::{Datelike, NaiveDate};

use super::dto::{ListingStatus, MetaData, ProductPayload};
use crate::config::PricingConfig;
use crate::models::{Course, CourseStatus, Facility, RepeatPattern};
use crate::services::availability::effective_status;
use crate::services::pricing::format_price;

pub const COURSE_ID_META_KEY: &str = "_academy_course_id";

/// Everything the listing needs besides the course row itself.
pub struct ListingContext<'a> {
    pub facility: Option<&'a Facility>,
    pub remaining_vacancy: i64,
    pub public_base_url: &'a str,
    pub pricing: &'a PricingConfig,
    pub today: NaiveDate,
}

pub fn enrolment_url(public_base_url: &str, course_id: i64) -> String {
    format!("{}/enrol?course={}", public_base_url, course_id)
}

pub fn build_payload(course: &Course, ctx: &ListingContext<'_>) -> ProductPayload {
    let status = match effective_status(course, ctx.today) {
        CourseStatus::Published => ListingStatus::Publish,
        CourseStatus::Draft | CourseStatus::Expired => ListingStatus::Draft,
    };

    ProductPayload {
        name: course.name.clone(),
        product_type: "external".to_string(),
        status,
        description: render_description(course, ctx),
        short_description: course.short_description.clone(),
        regular_price: course.price.round_dp(2).to_string(),
        external_url: enrolment_url(ctx.public_base_url, course.id),
        button_text: "Enrol Now".to_string(),
        meta_data: vec![MetaData {
            key: COURSE_ID_META_KEY.to_string(),
            value: course.id.to_string(),
        }],
    }
}

/// HTML description: the course's own text followed by an information list.
/// Teacher and classroom are internal and never listed.
pub fn render_description(course: &Course, ctx: &ListingContext<'_>) -> String {
    let mut details = vec![format!(
        "<strong>Course Fee:</strong> {}",
        format_price(course.price, ctx.pricing)
    )];

    if let Some(fee) = course.registration_fee.filter(|fee| !fee.is_zero()) {
        details.push(format!(
            "<strong>Registration Fee:</strong> {} (new students only)",
            format_price(fee, ctx.pricing)
        ));
    }

    details.push(format!(
        "<strong>Places Remaining:</strong> {}",
        ctx.remaining_vacancy
    ));

    if let Some(deadline) = course.enrolment_deadline {
        details.push(format!(
            "<strong>Enrolment Deadline:</strong> {}",
            deadline.format("%d %B %Y")
        ));
    }

    details.push(format!("<strong>Schedule:</strong> {}", schedule_line(course)));

    if let Some(facility) = ctx.facility {
        let mut location = format!("<strong>Location:</strong> {}", facility.name);
        if !facility.address.is_empty() {
            location.push_str(&format!(" - {}", facility.address));
        }
        details.push(location);
    }

    let items: Vec<String> = details.iter().map(|d| format!("<li>{}</li>", d)).collect();
    let info = format!("<h3>Course Information</h3>\n<ul>\n{}\n</ul>", items.join("\n"));

    if course.description.is_empty() {
        info
    } else {
        format!("{}\n\n{}", course.description, info)
    }
}

fn schedule_line(course: &Course) -> String {
    let start = course.start_date.format("%d %B %Y");
    let dates = match course.end_date {
        Some(end) if end != course.start_date => {
            format!("{} - {}", start, end.format("%d %B %Y"))
        }
        _ => start.to_string(),
    };

    let rhythm = match course.repeat_pattern {
        RepeatPattern::Once => String::new(),
        RepeatPattern::Daily => "daily, ".to_string(),
        RepeatPattern::Weekly => {
            let weekday = course.weekday.unwrap_or_else(|| course.start_date.weekday());
            format!("every {}, ", weekday_name(weekday))
        }
        RepeatPattern::Monthly => "monthly, ".to_string(),
    };

    format!(
        "{}{} at {} ({})",
        rhythm,
        dates,
        course.start_time.format("%H:%M"),
        duration_label(course.duration_minutes)
    )
}

fn weekday_name(weekday: chrono::Weekday) -> &'static str {
    use chrono::Weekday::*;
    match weekday {
        Mon => "Monday",
        Tue => "Tuesday",
        Wed => "Wednesday",
        Thu => "Thursday",
        Fri => "Friday",
        Sat => "Saturday",
        Sun => "Sunday",
    }
}

fn duration_label(minutes: i64) -> String {
    let (hours, mins) = (minutes / 60, minutes % 60);
    match (hours, mins) {
        (0, m) => format!("{} minutes", m),
        (1, 0) => "1 hour".to_string(),
        (h, 0) => format!("{} hours", h),
        (h, m) => format!("{}h {}min", h, m),
    }
}

//! Subject and body rendering for tracking update emails.

use crate::shipment::ShipmentStatus;

use super::TrackingUpdateEmail;

/// A rendered email ready to hand to a delivery API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

fn headline(status: ShipmentStatus) -> &'static str {
    match status {
        ShipmentStatus::Pending => "We're getting your order ready",
        ShipmentStatus::InfoReceived => "Your shipping label has been created",
        ShipmentStatus::InTransit => "Your order is on its way",
        ShipmentStatus::OutForDelivery => "Your order is out for delivery",
        ShipmentStatus::AttemptFail => "The carrier tried to deliver your order",
        ShipmentStatus::AvailableForPickup => "Your order is ready for pickup",
        ShipmentStatus::Exception => "There's a problem with your delivery",
        ShipmentStatus::Delivered => "Your order has been delivered",
        ShipmentStatus::Returned => "Your order is being returned to us",
        ShipmentStatus::Cancelled => "Your shipment was cancelled",
        ShipmentStatus::Unknown => "Your shipment has an update",
    }
}

fn detail(status: ShipmentStatus) -> &'static str {
    match status {
        ShipmentStatus::AttemptFail => {
            "The carrier will usually try again on the next business day."
        }
        ShipmentStatus::AvailableForPickup => {
            "Bring a photo ID to the pickup point listed on the carrier's page."
        }
        ShipmentStatus::Exception => {
            "The carrier reported a delay or issue. We'll keep an eye on it for you."
        }
        ShipmentStatus::Delivered => "We hope you enjoy your purchase.",
        ShipmentStatus::Returned | ShipmentStatus::Cancelled => {
            "Reply to this email if you have any questions."
        }
        _ => "You can follow its progress with the tracking number below.",
    }
}

/// Render subject, HTML and plain-text bodies.
pub fn render(email: &TrackingUpdateEmail, store_name: &str) -> RenderedEmail {
    let headline = headline(email.status);
    let detail = detail(email.status);

    let subject = format!(
        "{}: {} (order {})",
        store_name,
        email.status.label(),
        email.order_id
    );

    let text = format!(
        "{headline}\n\n{detail}\n\nOrder: {order}\nTracking number: {code}\nStatus: {label}\n\n{store}\n",
        headline = headline,
        detail = detail,
        order = email.order_id,
        code = email.tracking_code,
        label = email.status.label(),
        store = store_name,
    );

    let html = format!(
        "<h1>{headline}</h1>\n<p>{detail}</p>\n<p>Order: <strong>{order}</strong><br>\nTracking number: <code>{code}</code><br>\nStatus: {label}</p>\n<p>{store}</p>\n",
        headline = escape_html(headline),
        detail = escape_html(detail),
        order = escape_html(&email.order_id),
        code = escape_html(&email.tracking_code),
        label = escape_html(email.status.label()),
        store = escape_html(store_name),
    );

    RenderedEmail {
        subject,
        html,
        text,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

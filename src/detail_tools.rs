//! Order detail page tools.
//!
//! Computes the print-button descriptor for order-detail views. The webview
//! asks once per page load; when the current path is an order change page it
//! gets back the link element to append to the page's object-tools strip.
//! Stateless, so repeated calls for the same path yield the same descriptor.

use serde::Serialize;

const ORDER_DETAIL_PREFIX: &str = "/admin/store/order/";
const ORDER_DETAIL_SUFFIX: &str = "/change/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrintButton {
    pub order_id: String,
    pub href: String,
    pub label: String,
}

/// The order id when `path` is an order-detail page, e.g.
/// `/admin/store/order/119/change/`.
pub fn parse_order_detail_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(ORDER_DETAIL_PREFIX)?;
    let order_id = rest.strip_suffix(ORDER_DETAIL_SUFFIX)?;
    if order_id.is_empty() || !order_id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(order_id)
}

/// The print-button descriptor for `path`, when it is an order-detail page.
pub fn print_button_for_path(path: &str, lang: &str) -> Option<PrintButton> {
    let order_id = parse_order_detail_path(path.trim())?;
    let label = match lang {
        "en" => "🖨️ Print order".to_string(),
        _ => "🖨️ طباعة الطلب".to_string(),
    };
    Some(PrintButton {
        order_id: order_id.to_string(),
        href: format!("{ORDER_DETAIL_PREFIX}{order_id}/print/"),
        label,
    })
}

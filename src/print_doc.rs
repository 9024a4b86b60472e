//! Print-document template.
//!
//! Turns the structured order payload returned by the back office print
//! endpoint into a complete standalone HTML document. The dispatcher opens
//! the rendered document in a new browsing context; the document's on-load
//! hook invokes the platform print dialog, so rendering happens exactly once
//! per opened context.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrintItem {
    pub product_name: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub total_item_price: f64,
}

/// The order payload shape produced by the back office order serializer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OrderPrintDoc {
    pub id: i64,
    #[serde(default)]
    pub order_status: String,
    #[serde(default)]
    pub placed_at: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub items: Vec<PrintItem>,
    #[serde(default)]
    pub total_price: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub store_name: Option<String>,
}

impl OrderPrintDoc {
    /// Decode the `data` field of a print action response.
    pub fn from_payload(payload: Value) -> Result<Self, String> {
        serde_json::from_value(payload).map_err(|e| format!("Invalid order print payload: {e}"))
    }
}

fn esc(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn money(value: f64) -> String {
    format!("{value:.2}")
}

fn qty(value: f64) -> String {
    if (value.round() - value).abs() < f64::EPSILON {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn html_shell(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="ar" dir="rtl">
<head>
<meta charset="UTF-8"/>
<meta name="viewport" content="width=device-width, initial-scale=1.0"/>
<title>{}</title>
<style>
body {{ font-family: "Segoe UI", Tahoma, sans-serif; margin: 0; padding: 16px; background: #fff; color: #111; }}
.line {{ display: flex; justify-content: space-between; gap: 8px; font-size: 13px; }}
.line strong {{ font-size: 14px; }}
.section {{ margin-top: 10px; border-top: 1px dashed #111; padding-top: 8px; }}
.section h3 {{ margin: 0 0 6px 0; font-size: 13px; }}
.note {{ color: #666; font-size: 12px; }}
.center {{ text-align: center; }}
@media print {{ body {{ padding: 0; }} }}
</style>
</head>
<body onload="window.print()">{}</body>
</html>"#,
        esc(title),
        body
    )
}

/// Render the full printable document for an order.
pub fn render_print_html(doc: &OrderPrintDoc) -> String {
    let mut body = String::new();

    if let Some(store_name) = doc
        .store_name
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        body.push_str(&format!("<div class=\"center\"><strong>{}</strong></div>", esc(store_name)));
    }

    body.push_str(&format!(
        "<div class=\"section\"><div class=\"line\"><span>طلب</span><span>#{}</span></div>\
         <div class=\"line\"><span>الحالة</span><span>{}</span></div>\
         <div class=\"line\"><span>التاريخ</span><span>{}</span></div>\
         <div class=\"line\"><span>العميل</span><span>{}</span></div></div>",
        doc.id,
        esc(&doc.order_status),
        esc(&doc.placed_at),
        esc(&doc.customer)
    ));

    body.push_str("<div class=\"section\"><h3>الأصناف</h3>");
    if doc.items.is_empty() {
        body.push_str("<div class=\"note\">لا توجد أصناف</div>");
    } else {
        for item in &doc.items {
            body.push_str(&format!(
                "<div class=\"line\"><span>{}x {}</span><span>{}</span></div>",
                qty(item.quantity),
                esc(&item.product_name),
                money(item.total_item_price)
            ));
        }
    }
    body.push_str("</div>");

    if let Some(notes) = doc.notes.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        body.push_str(&format!(
            "<div class=\"section\"><h3>ملاحظات</h3><div class=\"note\">{}</div></div>",
            esc(notes)
        ));
    }

    body.push_str(&format!(
        "<div class=\"section\"><div class=\"line\"><strong>الإجمالي</strong><strong>{}</strong></div></div>",
        money(doc.total_price)
    ));

    html_shell(&format!("Order #{}", doc.id), &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_doc() -> OrderPrintDoc {
        OrderPrintDoc {
            id: 119,
            order_status: "Pending".into(),
            placed_at: "2025-03-01 14:30".into(),
            customer: "Ahmed Hassan".into(),
            items: vec![
                PrintItem {
                    product_name: "Dried Apricots 500g".into(),
                    quantity: 2.0,
                    total_item_price: 180.0,
                },
                PrintItem {
                    product_name: "Mixed Nuts 250g".into(),
                    quantity: 1.0,
                    total_item_price: 95.5,
                },
            ],
            total_price: 275.5,
            notes: Some("اتصل قبل التسليم".into()),
            store_name: Some("Dwar Market".into()),
        }
    }

    #[test]
    fn from_payload_decodes_serializer_shape() {
        let payload = serde_json::json!({
            "id": 119,
            "order_status": "Pending",
            "placed_at": "2025-03-01 14:30",
            "customer": "Ahmed Hassan",
            "items": [
                { "product_name": "Dried Apricots 500g", "quantity": 2, "total_item_price": 180.0 }
            ],
            "total_price": 180.0,
            "notes": null,
            "store_name": "Dwar Market"
        });
        let doc = OrderPrintDoc::from_payload(payload).expect("decode");
        assert_eq!(doc.id, 119);
        assert_eq!(doc.items.len(), 1);
        assert_eq!(doc.items[0].quantity, 2.0);
    }

    #[test]
    fn from_payload_rejects_non_order_shapes() {
        let err = OrderPrintDoc::from_payload(serde_json::json!("just text")).unwrap_err();
        assert!(err.contains("Invalid order print payload"));
    }

    #[test]
    fn rendered_document_is_complete_and_prints_on_load() {
        let html = render_print_html(&sample_doc());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("dir=\"rtl\""));
        assert!(html.contains("onload=\"window.print()\""));
        assert_eq!(html.matches("window.print()").count(), 1);
        assert!(html.contains("#119"));
        assert!(html.contains("Dried Apricots 500g"));
        assert!(html.contains("275.50"));
        assert!(html.contains("اتصل قبل التسليم"));
    }

    #[test]
    fn rendered_document_escapes_markup_in_order_data() {
        let mut doc = sample_doc();
        doc.customer = "<script>alert(1)</script>".into();
        let html = render_print_html(&doc);
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn empty_item_list_renders_placeholder() {
        let mut doc = sample_doc();
        doc.items.clear();
        doc.notes = None;
        let html = render_print_html(&doc);
        assert!(html.contains("لا توجد أصناف"));
        assert!(!html.contains("ملاحظات"));
    }
}

//! Public ticket page.
//!
//! Rendering is a pure function of [`TicketView`]; all matching is done by
//! `loto_core::reconcile` before the page sees it.

use std::fmt::Write as _;

use loto_core::{DrawOutcome, TicketView};

pub trait TicketPageRenderer: Send + Sync {
    fn render(&self, view: &TicketView) -> String;
}

/// Self-contained HTML page (inline CSS, no scripts).
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTicketPage;

const STYLE: &str = r#"
  :root { --primary: #33808d; --bg: #fcfcf9; --surface: #fffffd; --text: #13343b;
          --border: rgba(94, 82, 64, 0.2); --warn: #e68161; --match: #28a745; }
  * { margin: 0; padding: 0; box-sizing: border-box; }
  body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
         background: var(--bg); color: var(--text); line-height: 1.6; padding: 20px; }
  .container { max-width: 600px; margin: 0 auto; background: var(--surface);
               border-radius: 12px; box-shadow: 0 4px 6px rgba(0,0,0,0.04); padding: 30px; }
  h1 { color: var(--primary); font-size: 24px; margin-bottom: 20px; text-align: center; }
  .section { margin-bottom: 25px; padding-bottom: 25px; border-bottom: 1px solid var(--border); }
  .label { font-weight: 600; font-size: 14px; text-transform: uppercase; margin-bottom: 8px; }
  .numbers { display: flex; flex-wrap: wrap; gap: 10px; margin-top: 10px; }
  .number { width: 45px; height: 45px; display: flex; align-items: center; justify-content: center;
            border-radius: 50%; font-weight: 600; font-size: 18px; color: white;
            background: var(--primary); }
  .number.match { background: var(--match); box-shadow: 0 0 0 3px rgba(40,167,69,0.3); }
  .status { text-align: center; padding: 15px; border-radius: 8px; font-weight: 600; }
  .status.pending { color: var(--warn); background: rgba(168,75,47,0.1); }
  .match-info { text-align: center; padding: 20px; border-radius: 8px;
                background: rgba(40,167,69,0.1); border: 2px solid rgba(40,167,69,0.3); }
  .match-info h2 { color: var(--match); font-size: 20px; }
  .ticket-id { font-family: monospace; font-size: 12px; color: #777; text-align: center; margin-top: 20px; }
"#;

impl TicketPageRenderer for HtmlTicketPage {
    fn render(&self, view: &TicketView) -> String {
        let mut html = String::with_capacity(4096);
        let id = view.ticket_id;

        // Writing into a String cannot fail.
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n\
             <meta charset=\"UTF-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
             <title>Loto ticket {id}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
             <div class=\"container\">\n<h1>Loto 6/45 ticket</h1>\n"
        );

        let _ = write!(
            html,
            "<div class=\"section\"><div class=\"label\">Owner ID</div>\
             <div class=\"value\">{}</div></div>\n",
            escape_html(&view.owner_id)
        );

        html.push_str("<div class=\"section\"><div class=\"label\">Your numbers</div><div class=\"numbers\">");
        for n in &view.numbers {
            let class = if n.matched { "number match" } else { "number" };
            let _ = write!(html, "<div class=\"{class}\">{}</div>", n.value);
        }
        html.push_str("</div></div>\n");

        match &view.outcome {
            DrawOutcome::Pending => {
                html.push_str("<div class=\"status pending\">The draw has not taken place yet.</div>\n");
            }
            DrawOutcome::Drawn {
                drawn,
                matches,
                match_count,
            } => {
                html.push_str("<div class=\"section\"><div class=\"label\">Drawn numbers</div><div class=\"numbers\">");
                for n in drawn {
                    let _ = write!(html, "<div class=\"number\">{n}</div>");
                }
                html.push_str("</div></div>\n");

                let _ = write!(
                    html,
                    "<div class=\"match-info\"><h2>Matched: {match_count}/{}</h2>",
                    drawn.len()
                );
                if matches.is_empty() {
                    html.push_str("<p>No numbers matched this time.</p>");
                } else {
                    let list: Vec<String> = matches.iter().map(u8::to_string).collect();
                    let _ = write!(html, "<p>Matched numbers: {}</p>", list.join(", "));
                }
                html.push_str("</div>\n");
            }
        }

        let _ = write!(
            html,
            "<div class=\"ticket-id\">Ticket ID: {id}</div>\n</div>\n</body>\n</html>\n"
        );
        html
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

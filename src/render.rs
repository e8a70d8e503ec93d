//! Minimal HTML rendering for the page routes. Every value that came from a request
//! goes through [`escape`] (or arrives pre-escaped as [`Escaped`]) before it is embedded.

use std::fmt::Write as _;

use serde::Serialize;

/// Static figure shown on the members and checkout pages.
pub const MEMBER_MESSAGE: &str = "90265";

/// Text that has already been HTML-escaped and can be embedded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Escaped(String);

impl Escaped {
    pub fn as_str(&self) -> &str { &self.0 }
}

pub fn escape(input: &str) -> Escaped {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    Escaped(out)
}

/// The booking summary echoed by both checkout routes, built from escaped inputs.
pub fn checkout_route(from: &str, to: &str) -> Escaped {
    Escaped(format!("from {} to {}", escape(from).0, escape(to).0))
}

fn layout(title: &str, user: Option<&str>, body: &str) -> String {
    let mut nav = String::from("<a href=\"/\">home</a>");
    match user {
        Some(u) => {
            let _ = write!(
                nav,
                " | <a href=\"/members\">members</a> | <a href=\"/checkout\">checkout</a> | <a href=\"/logout\">logout</a> <span class=\"user\">{}</span>",
                escape(u).0
            );
        }
        None => nav.push_str(" | <a href=\"/login\">login</a> | <a href=\"/register\">register</a>"),
    }
    format!(
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title><link rel=\"stylesheet\" href=\"/static/style.css\"></head>\n<body>\n<nav>{nav}</nav>\n<main>\n{body}\n</main>\n</body>\n</html>\n",
        title = escape(title).0,
        nav = nav,
        body = body
    )
}

fn error_block(err: Option<&str>) -> String {
    err.map(|e| format!("<p class=\"error\">{}</p>\n", escape(e).0)).unwrap_or_default()
}

pub fn home_page(user: Option<&str>) -> String {
    let body = match user {
        Some(u) => format!("<h1>home</h1>\n<p>Logged in as {}.</p>", escape(u).0),
        None => "<h1>home</h1>\n<p>You are not logged in.</p>".to_string(),
    };
    layout("home", user, &body)
}

/// Which form the shared credentials page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsForm {
    Login,
    Register,
}

impl CredentialsForm {
    fn title(self) -> &'static str {
        match self {
            CredentialsForm::Login => "login",
            CredentialsForm::Register => "register",
        }
    }
}

pub fn credentials_page(form: CredentialsForm, user: Option<&str>, err: Option<&str>, signup_email: Option<&str>) -> String {
    let title = form.title();
    let mut body = format!("<h1>{}</h1>\n", title);
    body.push_str(&error_block(err));
    if let Some(email) = signup_email {
        let _ = writeln!(body, "<p class=\"success\">Registered {}. You can now <a href=\"/login\">log in</a>.</p>", escape(email).0);
    }
    let _ = write!(
        body,
        "<form method=\"post\" action=\"/{title}\">\n<input type=\"text\" name=\"email\" placeholder=\"email\">\n<input type=\"password\" name=\"password\" placeholder=\"password\">\n<button type=\"submit\">{title}</button>\n</form>",
        title = title
    );
    layout(title, user, &body)
}

pub fn members_page(title: &str, user: Option<&str>, err: Option<&str>) -> String {
    let mut body = format!("<h1>{}</h1>\n", escape(title).0);
    body.push_str(&error_block(err));
    if err.is_none() {
        let _ = write!(body, "<p>Your balance: <span class=\"balance\">{}</span></p>", MEMBER_MESSAGE);
    }
    layout(title, user, &body)
}

pub fn unauthorized_page() -> String {
    members_page("unauthorized", None, Some("Access Denied"))
}

pub fn checkout_page(user: Option<&str>, booked: Option<&Escaped>) -> String {
    let mut body = String::from("<h1>checkout</h1>\n");
    let _ = writeln!(body, "<p>Your balance: <span class=\"balance\">{}</span></p>", MEMBER_MESSAGE);
    if let Some(route) = booked {
        let _ = writeln!(body, "<p class=\"success\">Booked {}</p>", route.as_str());
    }
    body.push_str("<form method=\"post\" action=\"/checkout\">\n<input type=\"text\" name=\"from\" placeholder=\"from\">\n<input type=\"text\" name=\"to\" placeholder=\"to\">\n<button type=\"submit\">book</button>\n</form>");
    layout("checkout", user, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escape("<script>alert('x') & \"y\"</script>").as_str(),
            "&lt;script&gt;alert(&#39;x&#39;) &amp; &#34;y&#34;&lt;/script&gt;");
        assert_eq!(escape("plain text").as_str(), "plain text");
    }

    #[test]
    fn checkout_route_escapes_both_ends() {
        assert_eq!(checkout_route("A", "B").as_str(), "from A to B");
        assert_eq!(checkout_route("<b>", "x&y").as_str(), "from &lt;b&gt; to x&amp;y");
    }

    #[test]
    fn pages_never_embed_raw_user_input() {
        let evil = "<img src=x onerror=alert(1)>";
        for html in [
            home_page(Some(evil)),
            credentials_page(CredentialsForm::Register, None, Some(evil), Some(evil)),
            members_page("members", Some(evil), None),
        ] {
            assert!(!html.contains(evil));
            assert!(html.contains("&lt;img"));
        }
    }

    #[test]
    fn unauthorized_page_hides_balance() {
        let html = unauthorized_page();
        assert!(html.contains("Access Denied"));
        assert!(!html.contains(MEMBER_MESSAGE));
    }

    #[test]
    fn checkout_page_shows_booking() {
        let route = checkout_route("A", "B");
        let html = checkout_page(Some("user"), Some(&route));
        assert!(html.contains("Booked from A to B"));
    }
}

//! Server-rendered HTML for the browser flow

use std::fmt::Write as _;

use uuid::Uuid;

use crate::services::SessionContext;

const TITLE: &str = "Spotify Music Recommender";

pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{TITLE}</title>\n</head>\n<body>\n<h1>{TITLE}</h1>\n<p>Get personalized music recommendations based on your listening history!</p>\n{body}</body>\n</html>\n"
    )
}

pub fn landing() -> String {
    layout("<p><a href=\"/auth/login\">Connect Spotify</a></p>\n")
}

pub fn session(ctx: &SessionContext) -> String {
    let mut body = String::new();
    let base = format!("/sessions/{}", ctx.id);

    match &ctx.profile {
        Some(profile) => {
            let name = profile.display_name.as_deref().unwrap_or(&profile.id);
            body.push_str("<section id=\"profile\">");
            if let Some(url) = &profile.image_url {
                let _ = write!(
                    body,
                    "<img src=\"{}\" alt=\"Profile picture\" width=\"100\">",
                    escape_html(url)
                );
            }
            let _ = writeln!(
                body,
                "<h2>Welcome, {}!</h2><p>Followers: {}</p></section>",
                escape_html(name),
                profile.followers
            );
        }
        None if ctx.is_connected() => {
            body.push_str("<section id=\"profile\"><h2>Connected to Spotify</h2></section>\n");
        }
        None => {
            body.push_str("<p><a href=\"/auth/login\">Connect Spotify</a></p>\n");
        }
    }

    let _ = writeln!(
        body,
        "<form method=\"post\" action=\"{base}/recommend\"><button type=\"submit\">Get Recommendations</button></form>"
    );

    if let Some(recommendations) = ctx.recommendations.as_ref().filter(|r| !r.is_empty()) {
        body.push_str("<h2>Recommended Tracks</h2>\n<table>\n<tr><th>#</th><th>Track</th><th>Artist</th></tr>\n");
        for (i, rec) in recommendations.iter().enumerate() {
            let _ = writeln!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                i + 1,
                escape_html(&rec.track_name),
                escape_html(&rec.artist_name)
            );
        }
        body.push_str("</table>\n");
        let _ = writeln!(
            body,
            "<form method=\"post\" action=\"{base}/playlist\"><button type=\"submit\">Create Playlist</button></form>"
        );
    }

    if let Some(url) = ctx
        .last_playlist
        .as_ref()
        .and_then(|outcome| outcome.playlist.url.as_deref())
    {
        let _ = writeln!(
            body,
            "<p><a href=\"{}\">Open playlist in Spotify</a></p>",
            escape_html(url)
        );
    }

    if !ctx.transcript.lines().is_empty() {
        let _ = writeln!(
            body,
            "<h2>Progress</h2>\n<pre id=\"transcript\">{}</pre>",
            escape_html(&ctx.transcript.text())
        );
    }

    layout(&body)
}

/// Shown while an action holds the session
pub fn busy(id: Uuid) -> String {
    layout(&format!(
        "<p id=\"busy\">Working on it... this page will refresh when the current action finishes.</p>\n<p><a href=\"/sessions/{id}\">Refresh</a></p>\n<meta http-equiv=\"refresh\" content=\"2\">\n"
    ))
}

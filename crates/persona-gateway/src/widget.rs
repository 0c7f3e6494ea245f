//! Embedded HTML for the chat widget and the setup page.

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const STYLE: &str = r#"<style>
  body { font-family: system-ui, sans-serif; margin: 0; background: #f6f7f9; color: #1d2330; }
  main { max-width: 760px; margin: 0 auto; padding: 24px 16px; display: flex; flex-direction: column; height: 100vh; box-sizing: border-box; }
  h1 { font-size: 1.3rem; margin: 0 0 12px; }
  #log { flex: 1; overflow-y: auto; background: #fff; border: 1px solid #dde1e7; border-radius: 8px; padding: 12px; }
  .msg { margin: 8px 0; padding: 8px 12px; border-radius: 8px; white-space: pre-wrap; max-width: 85%; }
  .user { background: #dbe8ff; margin-left: auto; }
  .assistant { background: #eef0f3; }
  .error { background: #ffe1e1; }
  form { display: flex; gap: 8px; margin-top: 12px; }
  input { flex: 1; padding: 10px; border: 1px solid #c8ced8; border-radius: 6px; font-size: 1rem; }
  button { padding: 10px 16px; border: 0; border-radius: 6px; background: #2f6fed; color: #fff; cursor: pointer; }
  button.secondary { background: #8a93a3; }
</style>"#;

/// Chat page. History lives in `localStorage` and is sent with every message.
pub fn widget_html(name: &str) -> String {
    let name = escape_html(name);
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Chat with {name}</title>
{STYLE}
</head>
<body>
<main>
  <h1>Chat with {name}</h1>
  <div id="log"></div>
  <form id="form">
    <input id="input" autocomplete="off" placeholder="Ask about {name}'s career, skills or experience">
    <button type="submit">Send</button>
    <button type="button" class="secondary" id="clear">Clear</button>
  </form>
</main>
<script>
const KEY = "persona-history";
let history = JSON.parse(localStorage.getItem(KEY) || "[]");
const log = document.getElementById("log");
const input = document.getElementById("input");

function render(role, text) {{
  const div = document.createElement("div");
  div.className = "msg " + role;
  div.textContent = text;
  log.appendChild(div);
  log.scrollTop = log.scrollHeight;
}}

history.forEach(m => render(m.role, m.content));

document.getElementById("clear").onclick = () => {{
  history = [];
  localStorage.removeItem(KEY);
  log.innerHTML = "";
}};

document.getElementById("form").onsubmit = async (e) => {{
  e.preventDefault();
  const message = input.value.trim();
  if (!message) return;
  input.value = "";
  render("user", message);
  try {{
    const resp = await fetch("/api/v1/chat", {{
      method: "POST",
      headers: {{ "Content-Type": "application/json" }},
      body: JSON.stringify({{ message, history }})
    }});
    const data = await resp.json();
    if (data.ok) {{
      render("assistant", data.response);
      history.push({{ role: "user", content: message }}, {{ role: "assistant", content: data.response }});
      localStorage.setItem(KEY, JSON.stringify(history));
    }} else {{
      render("error", data.error || "Something went wrong");
    }}
  }} catch (err) {{
    render("error", String(err));
  }}
}};
</script>
</body>
</html>"#
    )
}

/// Shown instead of the chat when startup failed.
pub fn setup_html(problem: &str) -> String {
    let problem = escape_html(problem);
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Profile Agent - Setup Required</title>
{STYLE}
</head>
<body>
<main>
  <h1>Setup required</h1>
  <p>{problem}</p>
  <p>Add <code>me/summary.txt</code> and your resume PDF (or point <code>SUMMARY_PATH</code> and
  <code>RESUME_PDF</code> at them), then restart the server.</p>
</main>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_is_escaped() {
        let html = widget_html("<script>alert(1)</script>");
        assert!(!html.contains("<script>alert(1)"));
        assert!(html.contains("Chat with &lt;script&gt;"));
    }

    #[test]
    fn test_setup_page_shows_problem() {
        let html = setup_html("Summary file not found at me/summary.txt");
        assert!(html.contains("Setup required"));
        assert!(html.contains("Summary file not found at me/summary.txt"));
    }
}

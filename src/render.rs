//! HTML status page.
//!
//! Restore, delete and enabling public access all go through a confirmation
//! dialog in the page before the API is called.

use crate::types::{ServiceProbe, SnapshotRecord, StatusSnapshot, TailscaleStatus};
use chrono::Local;
use std::fmt::Write;

const STYLE: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: 'IBM Plex Mono', 'Courier New', monospace; background: #000080; min-height: 100vh; padding: 20px; color: #00ffff; }
.container { max-width: 1400px; margin: 0 auto; }
.header, .card { background: #0000aa; padding: 20px; border: 3px double #00ffff; box-shadow: 4px 4px 0 #000040; margin-bottom: 20px; }
h1 { color: #ffff00; margin-bottom: 10px; font-size: 28px; letter-spacing: 2px; text-shadow: 2px 2px 0 #000; }
.subtitle { font-size: 13px; }
.grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(350px, 1fr)); gap: 20px; }
.card h2 { color: #ffff00; margin-bottom: 15px; font-size: 16px; border-bottom: 2px solid #00ffff; padding-bottom: 8px; text-transform: uppercase; letter-spacing: 1px; }
.service { display: flex; align-items: center; justify-content: space-between; padding: 10px 0; border-bottom: 1px solid #0000ff; }
.service:last-child { border-bottom: none; }
.service-name { font-weight: 600; color: #fff; font-size: 13px; }
.service a { color: #00ffff; text-decoration: none; font-size: 12px; }
.detail { font-size: 12px; opacity: 0.9; }
.status-badge { padding: 2px 10px; font-size: 11px; font-weight: 700; border: 2px solid; text-transform: uppercase; }
.status-running { background: #00aa00; color: #00ff00; border-color: #00ff00; }
.status-stopped { background: #aa0000; color: #ff0000; border-color: #ff0000; }
.snapshot-item { padding: 10px; background: #000080; border: 1px solid #0000ff; margin-bottom: 8px; display: flex; justify-content: space-between; align-items: center; }
.snapshot-name { font-weight: 600; color: #ffff00; margin-bottom: 4px; font-size: 12px; }
.snapshot-meta { font-size: 11px; }
.snapshot-actions { display: flex; gap: 6px; }
.btn { padding: 6px 12px; border: 2px solid; font-size: 11px; font-weight: 700; cursor: pointer; font-family: inherit; text-transform: uppercase; }
.btn-restore { background: #0000aa; color: #00ffff; border-color: #00ffff; }
.btn-delete { background: #aa0000; color: #ff0000; border-color: #ff0000; }
.btn-create { background: #00aa00; color: #00ff00; border-color: #00ff00; width: 100%; padding: 10px; font-size: 13px; }
.input-group { margin-bottom: 15px; }
.input-group input { width: 100%; padding: 8px; border: 2px solid #00ffff; background: #000080; color: #ffff00; font-family: inherit; }
.empty-state { text-align: center; padding: 30px 20px; color: #0000ff; font-style: italic; }
.tailscale-card { background: #aa00aa; border-color: #ff00ff; }
.funnel-warning { background: #880088; padding: 10px; border: 2px solid #ff00ff; margin-top: 12px; font-size: 12px; color: #ffff00; }
.toast-container { position: fixed; top: 20px; right: 20px; z-index: 10000; display: flex; flex-direction: column; gap: 10px; max-width: 400px; }
.toast { background: #0000aa; border: 3px double #00ffff; padding: 15px 20px; color: #fff; font-size: 13px; min-width: 300px; }
.toast.success { border-color: #00ff00; }
.toast.error { border-color: #ff0000; background: #aa0000; }
.toast-title { font-weight: 700; margin-bottom: 5px; color: #ffff00; text-transform: uppercase; font-size: 12px; }
.modal-overlay { position: fixed; inset: 0; background: rgba(0, 0, 128, 0.8); z-index: 9999; display: none; align-items: center; justify-content: center; }
.modal-overlay.active { display: flex; }
.modal { background: #0000aa; border: 3px double #ffff00; padding: 25px; max-width: 500px; }
.modal-title { color: #ffff00; font-weight: 700; margin-bottom: 15px; }
.modal-message { margin-bottom: 20px; line-height: 1.5; }
.modal-buttons { display: flex; gap: 10px; justify-content: flex-end; }
"#;

const SCRIPT: &str = r#"
const basePath = '.';

function showToast(title, message, type) {
    const toast = document.createElement('div');
    toast.className = 'toast ' + (type || 'success');
    const titleEl = document.createElement('div');
    titleEl.className = 'toast-title';
    titleEl.textContent = title;
    const messageEl = document.createElement('div');
    messageEl.textContent = message;
    toast.appendChild(titleEl);
    toast.appendChild(messageEl);
    document.getElementById('toastContainer').appendChild(toast);
    setTimeout(() => toast.remove(), 5000);
}

function showConfirm(title, message) {
    return new Promise((resolve) => {
        const overlay = document.getElementById('modalOverlay');
        const yes = document.getElementById('modalYes');
        const no = document.getElementById('modalNo');
        document.getElementById('modalTitle').textContent = title;
        const messageEl = document.getElementById('modalMessage');
        messageEl.textContent = message;
        messageEl.style.whiteSpace = 'pre-line';
        overlay.classList.add('active');
        const done = (answer) => {
            overlay.classList.remove('active');
            yes.onclick = null;
            no.onclick = null;
            resolve(answer);
        };
        yes.onclick = () => done(true);
        no.onclick = () => done(false);
    });
}

function post(path, onSuccess) {
    return fetch(basePath + path, { method: 'POST' })
        .then(r => r.json())
        .then(data => {
            if (data.success) {
                onSuccess(data);
                setTimeout(() => location.reload(), 1500);
            } else {
                showToast('ERROR', data.error, 'error');
            }
        })
        .catch(err => showToast('ERROR', String(err), 'error'));
}

async function toggleFunnel(currentlyEnabled) {
    if (!currentlyEnabled) {
        const ok = await showConfirm('WARNING: PUBLIC ACCESS',
            'This will make your dev service publicly accessible on the internet!\n\nAnyone with the URL can access it.\nOnly your main app (/) will be exposed.\n\nAre you sure?');
        if (!ok) return;
    }
    post('/api/tailscale/toggle-funnel', data => showToast('SUCCESS', data.message, 'success'));
}

function createSnapshot() {
    const label = document.getElementById('snapshotLabel').value;
    post('/api/snapshots/create?label=' + encodeURIComponent(label),
        data => showToast('SNAPSHOT CREATED', 'Snapshot saved: ' + data.filename, 'success'));
}

async function restoreSnapshot(filename) {
    const ok = await showConfirm('RESTORE DATABASE',
        'Restore from ' + filename + '?\n\nThis will DROP ALL current data!\n\nThis action cannot be undone.');
    if (!ok) return;
    post('/api/snapshots/restore?filename=' + encodeURIComponent(filename),
        () => showToast('DATABASE RESTORED', 'Successfully restored from snapshot', 'success'));
}

async function deleteSnapshot(filename) {
    const ok = await showConfirm('DELETE SNAPSHOT', 'Delete ' + filename + '?\n\nThis action cannot be undone.');
    if (!ok) return;
    post('/api/snapshots/delete?filename=' + encodeURIComponent(filename),
        () => showToast('DELETED', 'Snapshot deleted successfully', 'success'));
}
"#;

/// Escape text for HTML element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

pub fn status_page(status: &StatusSnapshot) -> String {
    let mut html = String::with_capacity(16 * 1024);
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n\
         <title>DevBox - {name}</title>\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <style>{style}</style>\n</head>\n<body>\n",
        name = escape(&status.container_name),
        style = STYLE,
    );

    html.push_str(
        "<div class=\"toast-container\" id=\"toastContainer\"></div>\n\
         <div class=\"modal-overlay\" id=\"modalOverlay\"><div class=\"modal\">\
         <div class=\"modal-title\" id=\"modalTitle\"></div>\
         <div class=\"modal-message\" id=\"modalMessage\"></div>\
         <div class=\"modal-buttons\">\
         <button class=\"btn btn-create\" id=\"modalYes\">YES</button>\
         <button class=\"btn btn-delete\" id=\"modalNo\">CANCEL</button>\
         </div></div></div>\n",
    );

    let _ = write!(
        html,
        "<div class=\"container\">\n<div class=\"header\">\
         <h1>DEVBOX STATUS &middot; {name}</h1>\
         <p class=\"subtitle\">User: {user} | Database: {db} | Host: {host}</p></div>\n",
        name = escape(&status.container_name),
        user = escape(&status.username),
        db = escape(&status.database),
        host = escape(&status.hostname),
    );

    if status.tailscale.enabled {
        tailscale_card(&mut html, &status.tailscale);
    }

    if status.cloudflared_active {
        html.push_str(
            "<div class=\"card\"><h2>Cloudflare Tunnel</h2><div class=\"service\">\
             <div><div class=\"service-name\">Tunnel Status</div>\
             <div class=\"detail\">Active - traffic routed through Cloudflare</div></div>\
             <span class=\"status-badge status-running\">active</span></div></div>\n",
        );
    }

    html.push_str("<div class=\"grid\">\n<div class=\"card\"><h2>Services</h2>\n");
    for service in &status.services {
        service_row(&mut html, service);
    }
    html.push_str("</div>\n");

    html.push_str(
        "<div class=\"card\"><h2>Database Snapshots</h2>\
         <div class=\"input-group\"><input type=\"text\" id=\"snapshotLabel\" \
         placeholder=\"Snapshot label (optional)\" pattern=\"[A-Za-z0-9._-]*\" maxlength=\"64\"></div>\
         <button class=\"btn btn-create\" onclick=\"createSnapshot()\">Create Snapshot</button>\
         <div style=\"margin-top: 20px;\" id=\"snapshotList\">\n",
    );
    if status.snapshots.is_empty() {
        html.push_str("<div class=\"empty-state\">No snapshots yet</div>\n");
    } else {
        for snapshot in &status.snapshots {
            snapshot_row(&mut html, snapshot);
        }
    }
    html.push_str("</div></div>\n</div>\n</div>\n");

    let _ = write!(html, "<script>{}</script>\n</body>\n</html>\n", SCRIPT);
    html
}

fn tailscale_card(html: &mut String, ts: &TailscaleStatus) {
    let _ = write!(
        html,
        "<div class=\"card tailscale-card\"><h2>Tailscale Network</h2>\
         <div class=\"service\"><div><div class=\"service-name\">Tailnet Address</div>\
         <div class=\"detail\">{ip}</div></div>\
         <span class=\"status-badge status-running\">connected</span></div>\
         <div class=\"service\"><div><div class=\"service-name\">Hostname</div>\
         <div class=\"detail\">{host}</div></div></div>\
         <div class=\"service\"><div style=\"flex: 1;\"><div class=\"service-name\">Public Access (Funnel)</div>",
        ip = escape(&ts.tailnet_ip),
        host = escape(&ts.full_hostname),
    );
    if ts.funnel_enabled {
        let url = escape(&ts.public_url);
        let _ = write!(
            html,
            "<div class=\"detail\">Public: <a href=\"{url}\" target=\"_blank\">{url}</a></div></div>\
             <button class=\"btn btn-delete\" onclick=\"toggleFunnel(true)\">Disable Public</button></div>\
             <div class=\"funnel-warning\">Your development service is publicly accessible on the internet. \
             Only your main app (/) is exposed; admin tools remain private.</div>",
        );
    } else {
        html.push_str(
            "<div class=\"detail\">Private (Tailnet only)</div></div>\
             <button class=\"btn btn-restore\" onclick=\"toggleFunnel(false)\">Enable Public</button></div>",
        );
    }
    html.push_str("</div>\n");
}

fn service_row(html: &mut String, service: &ServiceProbe) {
    let link = service
        .url
        .as_deref()
        .map(|url| format!("<a href=\"{}\" target=\"_blank\">Open &rarr;</a>", escape(url)))
        .unwrap_or_default();
    let state = service.status.as_str();
    let _ = writeln!(
        html,
        "<div class=\"service\"><div><div class=\"service-name\">{name}</div>{link}</div>\
         <span class=\"status-badge status-{state}\">{state}</span></div>",
        name = escape(&service.name),
    );
}

fn snapshot_row(html: &mut String, snapshot: &SnapshotRecord) {
    // Files dropped into the directory by hand may carry any printable name.
    let name = escape(&snapshot.filename);
    let date = snapshot
        .modified
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M");
    let _ = writeln!(
        html,
        "<div class=\"snapshot-item\"><div class=\"snapshot-info\">\
         <div class=\"snapshot-name\">{name}</div>\
         <div class=\"snapshot-meta\">{size} &bull; {date}</div></div>\
         <div class=\"snapshot-actions\">\
         <button class=\"btn btn-restore\" data-filename=\"{name}\" onclick=\"restoreSnapshot(this.dataset.filename)\">Restore</button>\
         <button class=\"btn btn-delete\" data-filename=\"{name}\" onclick=\"deleteSnapshot(this.dataset.filename)\">Delete</button>\
         </div></div>",
        size = escape(&snapshot.size),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServiceState;
    use chrono::{TimeZone, Utc};

    fn status() -> StatusSnapshot {
        StatusSnapshot {
            captured_at: Utc::now(),
            container_name: "alice-box".into(),
            username: "alice".into(),
            database: "devdb".into(),
            dev_service_port: 3000,
            hostname: "c0ffee".into(),
            services: vec![
                ServiceProbe {
                    name: "SSH".into(),
                    port: 22,
                    status: ServiceState::Running,
                    url: None,
                },
                ServiceProbe {
                    name: "pgweb".into(),
                    port: 8081,
                    status: ServiceState::Stopped,
                    url: Some("/devbox/db/".into()),
                },
            ],
            snapshots: Vec::new(),
            tailscale: TailscaleStatus::disabled(),
            cloudflared_active: false,
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_page_lists_services() {
        let html = status_page(&status());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>DevBox - alice-box</title>"));
        assert!(html.contains("status-running\">running"));
        assert!(html.contains("status-stopped\">stopped"));
        assert!(html.contains("href=\"/devbox/db/\""));
        assert!(html.contains("No snapshots yet"));
        assert!(!html.contains("Tailscale Network"));
        assert!(!html.contains("Cloudflare Tunnel"));
    }

    #[test]
    fn test_page_lists_snapshots() {
        let mut s = status();
        s.snapshots.push(SnapshotRecord {
            filename: "2025-03-07T0905_foo.sql".into(),
            size_bytes: 2048,
            size: "2.0 KB".into(),
            modified: Utc.with_ymd_and_hms(2025, 3, 7, 9, 5, 0).unwrap(),
        });
        let html = status_page(&s);
        assert!(html.contains("2025-03-07T0905_foo.sql"));
        assert!(html.contains("2.0 KB"));
        assert!(html.contains("restoreSnapshot(this.dataset.filename)"));
        assert!(!html.contains("No snapshots yet"));
    }

    #[test]
    fn test_page_escapes_untrusted_names() {
        let mut s = status();
        s.container_name = "<script>alert(1)</script>".into();
        let html = status_page(&s);
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    }

    #[test]
    fn test_page_tailscale_card() {
        let mut s = status();
        s.tailscale = TailscaleStatus {
            enabled: true,
            tailnet_ip: "100.64.0.7".into(),
            hostname: "devbox".into(),
            full_hostname: "devbox.tail1234.ts.net".into(),
            funnel_enabled: true,
            public_url: "https://devbox.tail1234.ts.net".into(),
        };
        s.cloudflared_active = true;
        let html = status_page(&s);
        assert!(html.contains("Tailscale Network"));
        assert!(html.contains("100.64.0.7"));
        assert!(html.contains("Disable Public"));
        assert!(html.contains("publicly accessible"));
        assert!(html.contains("Cloudflare Tunnel"));
    }
}

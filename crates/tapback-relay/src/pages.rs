//! HTML pages served by the front door and the proxy.

use crate::proxy::RouteLink;

const STYLE_BASE: &str = "*{box-sizing:border-box;margin:0;padding:0}\
body{font-family:-apple-system,BlinkMacSystemFont,sans-serif;background:#0d1117;color:#c9d1d9}";

/// Minimal escaping for text interpolated into HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Login form, optionally with an error line under it.
pub fn pin_page(error: Option<&str>) -> String {
    let error_html = error
        .map(|e| format!("<div class=\"e\">{}</div>", escape_html(e)))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html><head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>Tapback</title>
<style>{STYLE_BASE}
body{{min-height:100vh;display:flex;align-items:center;justify-content:center}}
.c{{max-width:320px;width:100%;padding:20px;text-align:center}}
.l{{font-size:2rem;margin-bottom:1.5rem;color:#8b5cf6}}
.p{{width:100%;padding:1.2rem;font-size:2rem;text-align:center;letter-spacing:0.8rem;border:1px solid #30363d;border-radius:8px;background:#161b22;color:#c9d1d9;margin-bottom:1rem}}
.b{{width:100%;padding:1rem;font-size:1.1rem;border:none;border-radius:8px;background:#8b5cf6;color:#fff}}
.e{{color:#f85149;margin-top:1rem}}
</style></head>
<body><div class="c">
<div class="l">Tapback</div>
<form method="POST" action="/auth">
<input type="text" name="pin" class="p" maxlength="4" inputmode="numeric" placeholder="----" required autofocus>
<button type="submit" class="b">Unlock</button>
</form>{error_html}
</div></body></html>"#
    )
}

/// 502 page returned when a proxied app cannot be reached.
pub fn bad_gateway_page(local_port: u16, reason: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="UTF-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>502 Bad Gateway</title><style>{STYLE_BASE}body{{padding:24px}}h1{{color:#f85149;margin-bottom:12px}}code{{color:#8b5cf6}}</style></head>
<body><h1>502 Bad Gateway</h1>
<p>Nothing answered on <code>localhost:{local_port}</code>.</p>
<p>{}</p></body></html>"#,
        escape_html(reason)
    )
}

/// Terminal viewer: session tabs, live output, input row, assistant status
/// list, and links to proxied apps.
pub fn main_page(routes: &[RouteLink]) -> String {
    let app_links: String = routes
        .iter()
        .map(|route| {
            format!(
                r#"<a class="mtab" href="{}">:{}</a>"#,
                escape_html(&route.url),
                route.local_port
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html><head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width,initial-scale=1,maximum-scale=1,user-scalable=no,viewport-fit=cover">
<title>Tapback</title>
<style>{STYLE_BASE}
html,body{{height:100%;height:100dvh;overflow:hidden}}
body{{display:flex;flex-direction:column}}
#h{{padding:10px 14px;background:#161b22;border-bottom:1px solid #30363d;display:flex;justify-content:space-between;align-items:center}}
#h .t{{color:#8b5cf6;font-weight:bold;font-size:18px}}
.on{{color:#3fb950}}.off{{color:#f85149}}
.mtabs{{display:flex}}
.mtab{{flex:1;padding:10px;background:#161b22;color:#8b949e;text-align:center;text-decoration:none;font-weight:600}}
#status{{padding:6px 14px;background:#161b22;font-size:12px;color:#8b949e}}
#status .st{{margin-right:12px}}
.stabs{{display:flex;gap:4px;padding:8px;background:#161b22;border-bottom:1px solid #30363d;overflow-x:auto}}
.stab{{padding:8px 16px;background:#21262d;border:none;border-radius:8px;color:#8b949e;font-size:14px;white-space:nowrap}}
.stab.active{{background:#8b5cf6;color:#fff}}
#path{{padding:4px 14px;font-size:12px;color:#8b949e;font-family:monospace}}
#term{{flex:1;overflow-y:auto;padding:14px;font-size:13px;line-height:1.5;white-space:pre-wrap;word-break:break-all;font-family:monospace}}
#in{{padding:12px;background:#161b22;border-top:1px solid #30363d}}
.row{{display:flex;gap:8px}}.quick{{margin-bottom:8px}}
.btn{{padding:12px 18px;font-size:15px;font-weight:600;border:none;border-radius:10px}}
.bq{{flex:1;background:#21262d;color:#c9d1d9}}
.bsend{{background:#8b5cf6;color:#fff}}
#txt{{flex:1;padding:12px 14px;font-size:16px;background:#0d1117;color:#c9d1d9;border:1px solid #30363d;border-radius:10px;min-width:0}}
.empty{{color:#8b949e;text-align:center;padding:20px}}
</style></head>
<body>
<div id="h"><span class="t">Tapback</span><span id="st">...</span></div>
<div class="mtabs">{app_links}</div>
<div id="status"></div>
<div class="stabs" id="stabs"></div>
<div id="path"></div>
<div id="term"><div class="empty">No tmux sessions found</div></div>
<div id="in">
<div class="row quick">
<button class="btn bq" data-v="0">0</button><button class="btn bq" data-v="1">1</button>
<button class="btn bq" data-v="2">2</button><button class="btn bq" data-v="3">3</button>
<button class="btn bq" data-v="4">4</button>
</div>
<div class="row">
<input type="text" id="txt" placeholder="Input..." autocomplete="off" enterkeyhint="send">
<button class="btn bsend" id="send">Send</button>
</div>
</div>
<script>
const st=document.getElementById('st'),txt=document.getElementById('txt'),term=document.getElementById('term');
const stabs=document.getElementById('stabs'),pathEl=document.getElementById('path'),statusEl=document.getElementById('status');
const out={{}},paths={{}},seen={{}},statuses={{}};
let ws,activeId='';

function renderTabs(){{
  stabs.innerHTML='';
  Object.keys(out).forEach(id=>{{
    const b=document.createElement('button');
    b.className='stab'+(id===activeId?' active':'');
    b.textContent=id;
    b.onclick=()=>{{activeId=id;renderTabs();renderTerm()}};
    stabs.appendChild(b);
  }});
}}
function renderTerm(){{
  if(!activeId){{return}}
  const atBottom=term.scrollTop+term.clientHeight>=term.scrollHeight-20;
  term.textContent=out[activeId]||'';
  pathEl.textContent=paths[activeId]||'';
  if(atBottom)term.scrollTop=term.scrollHeight;
}}
function renderStatus(){{
  statusEl.innerHTML='';
  Object.values(statuses).sort((a,b)=>b.updated_at.localeCompare(a.updated_at)).forEach(s=>{{
    const span=document.createElement('span');
    span.className='st';
    span.textContent=(s.project_dir||s.session_id).split('/').pop()+': '+s.status;
    statusEl.appendChild(span);
  }});
}}
function prune(){{
  const now=Date.now();
  let changed=false;
  Object.keys(seen).forEach(id=>{{if(now-seen[id]>5000){{delete out[id];delete seen[id];changed=true}}}});
  if(changed){{if(!out[activeId])activeId=Object.keys(out)[0]||'';renderTabs();renderTerm()}}
}}
function connect(){{
  const p=location.protocol==='https:'?'wss:':'ws:';
  ws=new WebSocket(p+'//'+location.host+'/ws');
  ws.onopen=()=>{{st.textContent='Connected';st.className='on'}};
  ws.onmessage=(e)=>{{
    const d=JSON.parse(e.data);
    if(d.t==='o'){{
      const fresh=!(d.id in out);
      out[d.id]=d.c;paths[d.id]=d.path;seen[d.id]=Date.now();
      if(!activeId)activeId=d.id;
      if(fresh)renderTabs();
      if(d.id===activeId)renderTerm();
    }}else if(d.t==='status'){{
      statuses[d.d.project_dir||d.d.session_id]=d.d;renderStatus();
    }}
  }};
  ws.onclose=()=>{{st.textContent='Reconnecting...';st.className='off';setTimeout(connect,2000)}};
  ws.onerror=()=>ws.close();
}}
function send(v){{if(ws&&ws.readyState===1&&activeId)ws.send(JSON.stringify({{t:'i',id:activeId,c:v}}))}}
document.querySelectorAll('.bq').forEach(b=>b.onclick=()=>send(b.dataset.v));
document.getElementById('send').onclick=()=>{{send(txt.value);txt.value=''}};
txt.onkeydown=(e)=>{{if(e.key==='Enter'){{send(txt.value);txt.value=''}}}};
setInterval(prune,1000);
connect();
</script>
</body></html>"#
    )
}

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Local};
use structopt::StructOpt;

use expresso::json::Json;
use expresso::prelude::*;
use expresso::server::TcpServer;

#[derive(Debug, StructOpt)]
#[structopt(name = "guestbook", about = "Example guestbook server.")]
struct Opt {
    #[structopt(short, long, default_value = "8080")]
    port: u16,
    #[structopt(short, long, parse(from_os_str))]
    dir: Option<PathBuf>,
    #[structopt(long, default_value = "4")]
    threads: usize,
    #[structopt(long, default_value = "10")]
    timeout: u64,
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: usize,
}

struct Entry {
    author: String,
    message: String,
    posted_at: DateTime<Local>,
}

impl ToJsonObject for Entry {
    fn to_json_object(&self) -> Vec<(String, Json)> {
        vec![
            ("author".to_string(), Json::from(&self.author[..])),
            ("message".to_string(), Json::from(&self.message[..])),
            ("postedAt".to_string(), Json::from(self.posted_at)),
        ]
    }
}

fn timeout(seconds: u64) -> Option<Duration> {
    if seconds == 0 {
        None
    } else {
        Some(Duration::from_secs(seconds))
    }
}

fn api(sessions: Arc<SessionManager>) -> Router {
    let entries: Arc<Mutex<Vec<Entry>>> = Arc::new(Mutex::new(vec![]));

    let list_entries = {
        let entries = entries.clone();
        move |_req: &mut Request, res: &mut Response| -> HandlerResult {
            let entries = entries.lock().unwrap();
            let mut items = Json::array();
            for entry in entries.iter() {
                items = items.push(Json::from_object(entry));
            }
            res.send_json(&Json::object().with("entries", items));
            Ok(())
        }
    };

    let post_entry = {
        let entries = entries.clone();
        let sessions = sessions.clone();
        move |req: &mut Request, res: &mut Response| -> HandlerResult {
            let session = sessions.start(req, res);
            let author = req
                .form("author")
                .map(str::to_string)
                .or_else(|| session.get("author"))
                .ok_or("missing form field: author")?;
            let message = req.form("message").ok_or("missing form field: message")?;
            let entry = Entry {
                author: author.clone(),
                message: message.to_string(),
                posted_at: Local::now(),
            };
            session.set("author", &author);
            entries.lock().unwrap().push(entry);
            res.status(201);
            res.send_text("created");
            Ok(())
        }
    };

    let whoami = {
        let sessions = sessions.clone();
        move |req: &mut Request, res: &mut Response| -> HandlerResult {
            let session = sessions.start(req, res);
            res.send_json(
                &Json::object()
                    .with("sessionId", session.id())
                    .with("author", session.get("author")),
            );
            Ok(())
        }
    };

    let entry_by_index = {
        let entries = entries.clone();
        move |req: &mut Request, res: &mut Response| -> HandlerResult {
            let index: usize = req
                .param("index")
                .unwrap_or("")
                .parse()
                .map_err(|_| "index must be a number")?;
            let entries = entries.lock().unwrap();
            match entries.get(index) {
                Some(entry) => res.send_json(&Json::from_object(entry)),
                None => {
                    res.status(404);
                    res.send_text("no such entry");
                }
            }
            Ok(())
        }
    };

    Router::new()
        .with_get("/entries", list_entries)
        .with_get("/entries/:index", entry_by_index)
        .with_post("/entries", post_entry)
        .with_get("/whoami", whoami)
}

fn main() {
    let opt = Opt::from_args();

    stderrlog::new()
        .module(module_path!())
        .module("expresso")
        .verbosity(opt.verbose)
        .timestamp(stderrlog::Timestamp::Millisecond)
        .init()
        .unwrap();

    let sessions = Arc::new(SessionManager::new());
    let mut router = api(sessions);
    if let Some(dir) = &opt.dir {
        router = router.with_static_root(dir).unwrap();
    }

    let mut server = TcpServer::new(
        &format!("0.0.0.0:{}", opt.port),
        opt.threads,
        timeout(opt.timeout),
        router,
    )
    .unwrap();
    println!("Guestbook listening, check out: http://localhost:{}", opt.port);
    server.serve_forever();
}

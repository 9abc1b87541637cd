use rocket::{
    fairing::{Fairing, Info, Kind},
    http::StatusClass,
    tokio::{self, sync::broadcast::error::RecvError},
    Data, Orbit, Request, Response, Rocket,
};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crate::model::{common::election::ElectionId, ledger::Ledger};

/// What the logger remembers about a request between receiving it and
/// answering it.
#[derive(Debug, Clone)]
pub struct RequestTrace {
    pub id: usize,
    pub election: Option<ElectionId>,
    started: Instant,
}

impl RequestTrace {
    fn start(req: &Request<'_>) -> Self {
        static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(0);
        Self {
            id: REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed),
            election: election_of(req),
            started: Instant::now(),
        }
    }

    fn of<'a>(req: &'a Request<'_>) -> &'a Self {
        req.local_cache(|| Self::start(req))
    }
}

impl Display for RequestTrace {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)?;
        if let Some(election) = self.election {
            write!(f, " [election {election}]")?;
        }
        Ok(())
    }
}

/// The election a `/elections/<id>/...` request is about.
fn election_of(req: &Request<'_>) -> Option<ElectionId> {
    let mut segments = req.uri().path().segments();
    match (segments.next(), segments.next()) {
        (Some("elections"), Some(id)) => id.parse().ok(),
        _ => None,
    }
}

/// A rocket fairing that logs every request and response.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let protocol = if rocket.config().tls_enabled() {
            "https"
        } else {
            "http"
        };
        let ip = &rocket.config().address;
        let port = &rocket.config().port;
        info!("Server launched on {protocol}://{ip}:{port}");
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let trace = RequestTrace::of(req);
        info!("->req{trace} {} {}", req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let trace = RequestTrace::of(req);
        let elapsed = trace.started.elapsed().as_millis();
        let code = res.status();
        let route = match req.route() {
            Some(r) => match r.name {
                Some(ref name) => format!("{name} ({})", r.uri),
                None => r.uri.to_string(),
            },
            None => "no route".to_string(),
        };
        let log_msg = format!("<-rsp{trace} {code} {route} in {elapsed}ms");
        match code.class() {
            StatusClass::ServerError => error!("{log_msg}"),
            StatusClass::ClientError => warn!("{log_msg}"),
            _ => info!("{log_msg}"),
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutdown requested, stopping gracefully...");
    }
}

/// A rocket fairing that writes every committed ledger event to the log.
#[derive(Debug, Copy, Clone)]
pub struct EventAuditFairing;

#[rocket::async_trait]
impl Fairing for EventAuditFairing {
    fn info(&self) -> Info {
        Info {
            name: "Event audit",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let Some(ledger) = rocket.state::<Ledger>() else {
            warn!("No ledger to audit");
            return;
        };
        let mut events = ledger.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => info!("event {event}"),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Event audit fell behind, {missed} events not logged")
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

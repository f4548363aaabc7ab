use crate::handlers::guard::DenyReason;
use crate::handlers::token::Claims;
use crate::middleware::role_guard::GuardOutcome;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use log::{error, info, warn};
use std::{
    rc::Rc,
    time::{Duration, Instant},
};

/// Writes one `[GATEWAY-ACCESS]` line per request: which operation the
/// guard matched, what it decided, who the caller was and how it ended.
/// The HTTP-level line stays with actix's `Logger`.
pub struct AccessLog;

impl<S, B> Transform<S, ServiceRequest> for AccessLog
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AccessLogMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AccessLogMiddleware {
            service: Rc::new(service),
        })
    }
}

pub struct AccessLogMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AccessLogMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let service = self.service.clone();

        Box::pin(async move {
            let res = service.call(req).await;

            match &res {
                Ok(response) => {
                    let line = access_line(response, start_time.elapsed());
                    let denied = response
                        .request()
                        .extensions()
                        .get::<GuardOutcome>()
                        .is_some_and(|outcome| outcome.denied.is_some());

                    if response.status().is_server_error() {
                        error!("{}", line);
                    } else if denied {
                        warn!("{}", line);
                    } else {
                        info!("{}", line);
                    }
                }
                Err(err) => {
                    error!(
                        "[GATEWAY-ACCESS] op=- decision=error status={} error={} time={:.2?}",
                        err.as_response_error().status_code().as_u16(),
                        err,
                        start_time.elapsed()
                    );
                }
            }

            res
        })
    }
}

/// Builds the access line for a finished request.
pub fn access_line<B>(response: &ServiceResponse<B>, elapsed: Duration) -> String {
    let request = response.request();
    let extensions = request.extensions();
    let outcome = extensions.get::<GuardOutcome>();

    let (operation, decision) = match outcome {
        None => ("-", "unguarded"),
        Some(GuardOutcome { operation_id, denied }) => {
            let decision = match denied {
                None => "allow",
                Some(DenyReason::Unauthenticated) => "unauthenticated",
                Some(DenyReason::Forbidden) => "forbidden",
            };
            (*operation_id, decision)
        }
    };

    let caller = extensions
        .get::<Claims>()
        .map(|claims| claims.subject.as_str())
        .unwrap_or("-");

    format!(
        "[GATEWAY-ACCESS] {} {} op={} decision={} caller={} status={} time={:.2?}",
        request.method(),
        request.path(),
        operation,
        decision,
        caller,
        response.status().as_u16(),
        elapsed
    )
}

use crate::errors::ApiError;
use crate::handlers::guard::{AccessGuard, Decision, DenyReason};
use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    web, Error, HttpMessage,
};
use futures_util::future::{ok, Ready};
use log::{debug, error};
use std::{future::Future, pin::Pin, rc::Rc};

/// What the guard decided for a request, left in its extensions for the
/// access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardOutcome {
    pub operation_id: &'static str,
    pub denied: Option<DenyReason>,
}

/// Route middleware that runs the access guard for one operation
/// before its handler. Verified claims land in request extensions.
pub struct RoleGuard {
    operation_id: &'static str,
}

impl RoleGuard {
    pub fn new(operation_id: &'static str) -> Self {
        RoleGuard { operation_id }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RoleGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RoleGuardMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RoleGuardMiddleware {
            service: Rc::new(service),
            operation_id: self.operation_id,
        })
    }
}

pub struct RoleGuardMiddleware<S> {
    service: Rc<S>,
    operation_id: &'static str,
}

impl<S, B> Service<ServiceRequest> for RoleGuardMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let operation_id = self.operation_id;

        Box::pin(async move {
            let guard = match req.app_data::<web::Data<AccessGuard>>() {
                Some(guard) => guard.clone(),
                None => {
                    error!("AccessGuard missing from app data for {}", operation_id);
                    let err = ApiError::Internal("access guard not configured".into());
                    return Ok(req.error_response(err).map_into_right_body());
                }
            };

            let authorization = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok());

            match guard.decide(operation_id, authorization) {
                Decision::Allow(claims) => {
                    {
                        let mut extensions = req.extensions_mut();
                        extensions.insert(GuardOutcome {
                            operation_id,
                            denied: None,
                        });
                        if let Some(claims) = claims {
                            extensions.insert(claims);
                        }
                    }
                    service
                        .call(req)
                        .await
                        .map(ServiceResponse::map_into_left_body)
                }
                Decision::Deny(reason) => {
                    debug!("Denied {} ({:?})", operation_id, reason);
                    req.extensions_mut().insert(GuardOutcome {
                        operation_id,
                        denied: Some(reason),
                    });
                    Ok(req.error_response(ApiError::from(reason)).map_into_right_body())
                }
            }
        })
    }
}

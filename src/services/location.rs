// src/services/location.rs

use chrono::{DateTime, Utc};

use crate::{
    common::{
        error::AppError,
        geo::{haversine_m, parse_wkt_point, GeoPoint},
    },
    db::{AuditRepository, OrderRepository, TrackingRepository, UserRepository},
    models::{
        auth::{Role, User},
        tracking::{events, TrackingSession, UpdateLocationPayload, UpdateLocationResponse},
    },
};

// Limiares do throttle de amostras. Uma amostra entra quando QUALQUER um dos
// dois limiares é ultrapassado; só é descartada quando ambos estão abaixo.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    pub min_interval_secs: i64,
    pub min_distance_m: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 30,
            min_distance_m: 25.0,
        }
    }
}

// Decisão pura do throttle, separada do I/O.
pub fn should_record_sample(
    last: Option<(DateTime<Utc>, GeoPoint)>,
    now: DateTime<Utc>,
    candidate: &GeoPoint,
    config: &ThrottleConfig,
) -> bool {
    let Some((last_at, last_point)) = last else {
        // Primeira amostra da sessão sempre entra.
        return true;
    };

    let elapsed_secs = (now - last_at).num_seconds();
    if elapsed_secs >= config.min_interval_secs {
        return true;
    }

    haversine_m(&last_point, candidate) >= config.min_distance_m
}

#[derive(Clone)]
pub struct LocationService {
    orders: OrderRepository,
    tracking: TrackingRepository,
    users: UserRepository,
    audit: AuditRepository,
    config: ThrottleConfig,
}

impl LocationService {
    pub fn new(
        orders: OrderRepository,
        tracking: TrackingRepository,
        users: UserRepository,
        audit: AuditRepository,
        config: ThrottleConfig,
    ) -> Self {
        Self {
            orders,
            tracking,
            users,
            audit,
            config,
        }
    }

    // Carrega o pedido e confere tenant + atribuição ao motorista.
    async fn load_assigned_order(
        &self,
        actor: &User,
        order_id: uuid::Uuid,
    ) -> Result<crate::models::orders::Order, AppError> {
        if actor.role != Role::Driver {
            return Err(AppError::RoleNotAllowed(actor.role.as_str()));
        }
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(AppError::OrderNotFound)?;
        if order.tenant_id != actor.tenant_id {
            return Err(AppError::AccessDenied);
        }
        if order.assigned_driver_id != Some(actor.id) {
            return Err(AppError::NotAssigned);
        }
        Ok(order)
    }

    // Inicia a sessão de rastreamento do motorista para um pedido.
    // Uma sessão por motorista: iniciar de novo substitui a anterior.
    pub async fn start_tracking(
        &self,
        actor: &User,
        order_id: uuid::Uuid,
    ) -> Result<TrackingSession, AppError> {
        let order = self.load_assigned_order(actor, order_id).await?;

        let session = self.tracking.upsert_session(actor.id, order.id).await?;

        self.audit
            .record_best_effort(
                order.tenant_id,
                Some(order.id),
                Some(actor.id),
                events::TRACKING_STARTED,
                None,
            )
            .await;

        Ok(session)
    }

    pub async fn stop_tracking(&self, actor: &User) -> Result<bool, AppError> {
        if actor.role != Role::Driver {
            return Err(AppError::RoleNotAllowed(actor.role.as_str()));
        }

        let session = self.tracking.find_session(actor.id).await?;
        let stopped = self.tracking.delete_session(actor.id).await?;

        if let Some(session) = session {
            self.audit
                .record_best_effort(
                    actor.tenant_id,
                    Some(session.order_id),
                    Some(actor.id),
                    events::TRACKING_STOPPED,
                    None,
                )
                .await;
        }

        Ok(stopped)
    }

    // Recebe uma amostra do app. Valida faixas, aplica o throttle e, se a
    // amostra entrar, persiste o LocationUpdate e atualiza a última posição
    // conhecida do motorista.
    pub async fn record_update(
        &self,
        actor: &User,
        payload: UpdateLocationPayload,
    ) -> Result<UpdateLocationResponse, AppError> {
        let point = GeoPoint::new(payload.latitude, payload.longitude)?;
        let order = self.load_assigned_order(actor, payload.order_id).await?;

        let last = self
            .tracking
            .last_sample(order.id, actor.id)
            .await?
            .and_then(|(at, wkt)| parse_wkt_point(&wkt).ok().map(|p| (at, p)));

        if !should_record_sample(last, Utc::now(), &point, &self.config) {
            return Ok(UpdateLocationResponse {
                accepted: false,
                update: None,
            });
        }

        let wkt = point.to_wkt();
        let update = self
            .tracking
            .insert_location_update(
                order.id,
                actor.id,
                order.tenant_id,
                &wkt,
                payload.accuracy,
                payload.speed,
                payload.heading,
                payload.battery_level,
            )
            .await?;

        self.users.update_last_location(actor.id, &wkt).await?;

        Ok(UpdateLocationResponse {
            accepted: true,
            update: Some(update),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn point(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn first_sample_is_always_recorded() {
        let config = ThrottleConfig::default();
        let now = Utc::now();
        assert!(should_record_sample(None, now, &point(0.0, 0.0), &config));
    }

    #[test]
    fn recent_and_nearby_sample_is_throttled() {
        let config = ThrottleConfig::default();
        let now = Utc::now();
        let last = Some((now - Duration::seconds(5), point(-23.5505, -46.6333)));

        // ~1 metro de deslocamento, 5 segundos depois: descarta.
        assert!(!should_record_sample(
            last,
            now,
            &point(-23.550509, -46.6333),
            &config
        ));
    }

    #[test]
    fn elapsed_interval_accepts_even_without_movement() {
        let config = ThrottleConfig::default();
        let now = Utc::now();
        let p = point(-23.5505, -46.6333);
        let last = Some((now - Duration::seconds(config.min_interval_secs), p));

        assert!(should_record_sample(last, now, &p, &config));
    }

    #[test]
    fn big_jump_accepts_even_within_the_interval() {
        let config = ThrottleConfig::default();
        let now = Utc::now();
        let last = Some((now - Duration::seconds(2), point(-23.5505, -46.6333)));

        // ~500 metros em 2 segundos: entra pela distância.
        assert!(should_record_sample(
            last,
            now,
            &point(-23.5460, -46.6333),
            &config
        ));
    }
}

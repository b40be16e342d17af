// src/services/order_creation.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use image::Luma;
use qrcode::{EcLevel, QrCode};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    common::{error::AppError, geo::parse_point_value, saga::Saga},
    db::{order_repo::NewOrder, OrderRepository, QrCodeRepository},
    models::orders::{CreateOrderData, Order, PointPayload, QrCodeRecord},
    services::{signature::SignatureService, storage::ObjectStorage},
};

// Nomes das etapas, usados no corpo de erro e nos logs da saga.
const STEP_CREATE_ORDER: &str = "criar_pedido";
const STEP_CREATE_QR: &str = "registrar_qr_code";
const STEP_RENDER: &str = "renderizar_imagem";
const STEP_UPLOAD: &str = "upload_imagem";
const STEP_SET_URL: &str = "gravar_url_imagem";
const STEP_BIND: &str = "vincular_qr_pedido";

// O que o orquestrador precisa do banco. Em produção é o Postgres
// (PgCreationStore); nos testes, um armazenamento em memória que permite
// injetar falha em cada etapa.
#[async_trait]
pub trait CreationStore: Send + Sync + 'static {
    async fn insert_order(&self, data: &NewOrder) -> Result<Order, AppError>;
    async fn delete_order(&self, id: Uuid) -> Result<(), AppError>;
    async fn insert_qr_code(
        &self,
        order_id: Uuid,
        tenant_id: Uuid,
        tracking_code: &str,
        payload: &str,
        signature: &str,
    ) -> Result<QrCodeRecord, AppError>;
    async fn delete_qr_code(&self, id: Uuid) -> Result<(), AppError>;
    async fn set_qr_image_url(&self, id: Uuid, image_url: &str) -> Result<QrCodeRecord, AppError>;
    async fn bind_order_qr(
        &self,
        order_id: Uuid,
        qr_code_id: Uuid,
        qr_code_data: &str,
        qr_code_signature: &str,
    ) -> Result<Order, AppError>;
}

pub struct PgCreationStore {
    orders: OrderRepository,
    qr_codes: QrCodeRepository,
}

impl PgCreationStore {
    pub fn new(orders: OrderRepository, qr_codes: QrCodeRepository) -> Self {
        Self { orders, qr_codes }
    }
}

#[async_trait]
impl CreationStore for PgCreationStore {
    async fn insert_order(&self, data: &NewOrder) -> Result<Order, AppError> {
        self.orders.insert(data).await
    }

    async fn delete_order(&self, id: Uuid) -> Result<(), AppError> {
        self.orders.delete(id).await
    }

    async fn insert_qr_code(
        &self,
        order_id: Uuid,
        tenant_id: Uuid,
        tracking_code: &str,
        payload: &str,
        signature: &str,
    ) -> Result<QrCodeRecord, AppError> {
        self.qr_codes
            .insert(order_id, tenant_id, tracking_code, payload, signature)
            .await
    }

    async fn delete_qr_code(&self, id: Uuid) -> Result<(), AppError> {
        self.qr_codes.delete(id).await
    }

    async fn set_qr_image_url(&self, id: Uuid, image_url: &str) -> Result<QrCodeRecord, AppError> {
        self.qr_codes.set_image_url(id, image_url).await
    }

    async fn bind_order_qr(
        &self,
        order_id: Uuid,
        qr_code_id: Uuid,
        qr_code_data: &str,
        qr_code_signature: &str,
    ) -> Result<Order, AppError> {
        self.orders
            .bind_qr_code(order_id, qr_code_id, qr_code_data, qr_code_signature)
            .await
    }
}

// Renderização do QR em PNG, separada para poder injetar falha na etapa 3.
pub trait QrImageRenderer: Send + Sync + 'static {
    fn render_png(&self, data: &str) -> Result<Vec<u8>, AppError>;
}

pub struct PngQrRenderer;

impl QrImageRenderer for PngQrRenderer {
    fn render_png(&self, data: &str) -> Result<Vec<u8>, AppError> {
        // Correção de erro média, módulos de 4px e quiet zone padrão.
        let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::M)
            .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;

        let image_buffer = code
            .render::<Luma<u8>>()
            .module_dimensions(4, 4)
            .quiet_zone(true)
            .build();
        let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);

        let mut buffer = Vec::new();
        dynamic_image
            .write_to(&mut buffer, image::ImageOutputFormat::Png)
            .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;

        Ok(buffer)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreationResult {
    pub order: Order,
    pub qr_code: QrCodeRecord,
    pub qr_code_url: String,
}

// O orquestrador de criação de pedido: cinco etapas efetivas, cada uma com a
// sua compensação registrada na saga. Não é uma transação (o storage de
// objetos não participaria); é rollback best-effort, na ordem reversa.
#[derive(Clone)]
pub struct OrderCreationService {
    store: Arc<dyn CreationStore>,
    storage: Arc<dyn ObjectStorage>,
    renderer: Arc<dyn QrImageRenderer>,
    signature: SignatureService,
}

impl OrderCreationService {
    pub fn new(
        store: Arc<dyn CreationStore>,
        storage: Arc<dyn ObjectStorage>,
        renderer: Arc<dyn QrImageRenderer>,
        signature: SignatureService,
    ) -> Self {
        Self {
            store,
            storage,
            renderer,
            signature,
        }
    }

    pub async fn create_order(
        &self,
        tenant_id: Uuid,
        created_by: Uuid,
        data: CreateOrderData,
    ) -> Result<OrderCreationResult, AppError> {
        // Normaliza as localizações ANTES de qualquer efeito: erro aqui é 400,
        // não dispara rollback nenhum.
        let new_order = self.build_new_order(tenant_id, created_by, &data)?;

        let mut saga = Saga::new("order_creation");

        // --- Etapa 1: Insere o pedido (status nasce 'pending') ---
        let order = match self.store.insert_order(&new_order).await {
            Ok(order) => order,
            Err(e) => return Err(saga.fail(STEP_CREATE_ORDER, e).await),
        };
        saga.push(STEP_CREATE_ORDER, {
            let store = Arc::clone(&self.store);
            let order_id = order.id;
            Box::pin(async move { store.delete_order(order_id).await })
        });

        // --- Etapa 2: Monta o payload assinado e registra o QR Code ---
        let timestamp_ms = order.created_at.timestamp_millis();
        let tracking_code = generate_tracking_code();
        let (qr_data, qr_signature) =
            match self
                .signature
                .encode_payload(order.id, &tracking_code, timestamp_ms)
            {
                Ok(pair) => pair,
                Err(e) => return Err(saga.fail(STEP_CREATE_QR, e).await),
            };

        let qr_record = match self
            .store
            .insert_qr_code(order.id, tenant_id, &tracking_code, &qr_data, &qr_signature)
            .await
        {
            Ok(record) => record,
            Err(e) => return Err(saga.fail(STEP_CREATE_QR, e).await),
        };
        saga.push(STEP_CREATE_QR, {
            let store = Arc::clone(&self.store);
            let qr_id = qr_record.id;
            Box::pin(async move { store.delete_qr_code(qr_id).await })
        });

        // --- Etapa 3: Renderiza o PNG (pura, sem compensação própria) ---
        let png = match self.renderer.render_png(&qr_data) {
            Ok(png) => png,
            Err(e) => return Err(saga.fail(STEP_RENDER, e).await),
        };

        // --- Etapa 4: Upload para o object storage ---
        let object_key = format!("qr_order_{}_{}.png", order.id, timestamp_ms);
        let image_url = match self
            .storage
            .put_object(&object_key, png, "image/png")
            .await
        {
            Ok(url) => url,
            Err(e) => return Err(saga.fail(STEP_UPLOAD, AppError::InternalServerError(e)).await),
        };
        saga.push(STEP_UPLOAD, {
            let storage = Arc::clone(&self.storage);
            let key = object_key.clone();
            Box::pin(async move {
                storage
                    .delete_object(&key)
                    .await
                    .map_err(AppError::InternalServerError)
            })
        });

        // --- Etapa 5: Grava a URL no registro do QR ---
        let qr_record = match self.store.set_qr_image_url(qr_record.id, &image_url).await {
            Ok(record) => record,
            Err(e) => return Err(saga.fail(STEP_SET_URL, e).await),
        };

        // --- Etapa 6: Amarra o QR ao pedido ---
        let order = match self
            .store
            .bind_order_qr(order.id, qr_record.id, &qr_data, &qr_signature)
            .await
        {
            Ok(order) => order,
            Err(e) => return Err(saga.fail(STEP_BIND, e).await),
        };

        // Tudo consistente: descarta as compensações.
        saga.commit();

        Ok(OrderCreationResult {
            order,
            qr_code: qr_record,
            qr_code_url: image_url,
        })
    }

    fn build_new_order(
        &self,
        tenant_id: Uuid,
        created_by: Uuid,
        data: &CreateOrderData,
    ) -> Result<NewOrder, AppError> {
        let now = Utc::now();
        let order_number = match &data.order_number {
            Some(n) if !n.trim().is_empty() => n.trim().to_string(),
            _ => generate_order_number(),
        };

        let (loading_wkt, unloading_wkt) = (
            point_wkt(&data.loading_point)?,
            point_wkt(&data.unloading_point)?,
        );

        Ok(NewOrder {
            tenant_id,
            order_number,
            assigned_driver_id: data.assigned_driver_id,
            qr_code_expires_at: now + Duration::hours(24),
            loading_point_name: data.loading_point.name.clone(),
            loading_point_address: data.loading_point.address.clone(),
            loading_point_location: loading_wkt,
            loading_window_start: data.loading_point.window_start,
            loading_window_end: data.loading_point.window_end,
            unloading_point_name: data.unloading_point.name.clone(),
            unloading_point_address: data.unloading_point.address.clone(),
            unloading_point_location: unloading_wkt,
            unloading_window_start: data.unloading_point.window_start,
            unloading_window_end: data.unloading_point.window_end,
            waypoints: data.waypoints.clone(),
            notes: data.notes.clone(),
            created_by,
        })
    }
}

fn point_wkt(point: &PointPayload) -> Result<Option<String>, AppError> {
    match &point.location {
        Some(value) => Ok(Some(parse_point_value(value)?.to_wkt())),
        None => Ok(None),
    }
}

fn generate_order_number() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "ORD-{}-{}",
        Utc::now().format("%Y%m%d"),
        suffix[..6].to_uppercase()
    )
}

fn generate_tracking_code() -> String {
    Uuid::new_v4().simple().to_string()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::orders::OrderStatus;
    use std::collections::HashMap;
    use std::sync::Mutex;

    // --- Dublês de teste ---

    #[derive(Default)]
    struct MemoryStore {
        orders: Mutex<HashMap<Uuid, Order>>,
        qr_codes: Mutex<HashMap<Uuid, QrCodeRecord>>,
        fail_insert_order: bool,
        fail_insert_qr: bool,
        fail_set_image_url: bool,
        fail_bind: bool,
    }

    fn injected_failure() -> AppError {
        AppError::BadRequest("falha injetada".to_string())
    }

    fn order_from(data: &NewOrder) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            tenant_id: data.tenant_id,
            order_number: data.order_number.clone(),
            status: OrderStatus::Pending,
            assigned_driver_id: data.assigned_driver_id,
            qr_code_id: None,
            qr_code_data: None,
            qr_code_signature: None,
            qr_code_expires_at: Some(data.qr_code_expires_at),
            loading_point_name: data.loading_point_name.clone(),
            loading_point_address: data.loading_point_address.clone(),
            loading_point_location: data.loading_point_location.clone(),
            loading_window_start: data.loading_window_start,
            loading_window_end: data.loading_window_end,
            unloading_point_name: data.unloading_point_name.clone(),
            unloading_point_address: data.unloading_point_address.clone(),
            unloading_point_location: data.unloading_point_location.clone(),
            unloading_window_start: data.unloading_window_start,
            unloading_window_end: data.unloading_window_end,
            waypoints: data.waypoints.clone(),
            notes: data.notes.clone(),
            created_by: Some(data.created_by),
            created_at: now,
            updated_at: now,
        }
    }

    #[async_trait]
    impl CreationStore for MemoryStore {
        async fn insert_order(&self, data: &NewOrder) -> Result<Order, AppError> {
            if self.fail_insert_order {
                return Err(injected_failure());
            }
            let order = order_from(data);
            self.orders.lock().unwrap().insert(order.id, order.clone());
            Ok(order)
        }

        async fn delete_order(&self, id: Uuid) -> Result<(), AppError> {
            self.orders.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn insert_qr_code(
            &self,
            order_id: Uuid,
            tenant_id: Uuid,
            tracking_code: &str,
            payload: &str,
            signature: &str,
        ) -> Result<QrCodeRecord, AppError> {
            if self.fail_insert_qr {
                return Err(injected_failure());
            }
            let record = QrCodeRecord {
                id: Uuid::new_v4(),
                order_id,
                tenant_id,
                tracking_code: tracking_code.to_string(),
                payload: payload.to_string(),
                signature: signature.to_string(),
                image_url: None,
                created_at: Utc::now(),
            };
            self.qr_codes
                .lock()
                .unwrap()
                .insert(record.id, record.clone());
            Ok(record)
        }

        async fn delete_qr_code(&self, id: Uuid) -> Result<(), AppError> {
            self.qr_codes.lock().unwrap().remove(&id);
            Ok(())
        }

        async fn set_qr_image_url(
            &self,
            id: Uuid,
            image_url: &str,
        ) -> Result<QrCodeRecord, AppError> {
            if self.fail_set_image_url {
                return Err(injected_failure());
            }
            let mut qr_codes = self.qr_codes.lock().unwrap();
            let record = qr_codes.get_mut(&id).ok_or(AppError::OrderNotFound)?;
            record.image_url = Some(image_url.to_string());
            Ok(record.clone())
        }

        async fn bind_order_qr(
            &self,
            order_id: Uuid,
            qr_code_id: Uuid,
            qr_code_data: &str,
            qr_code_signature: &str,
        ) -> Result<Order, AppError> {
            if self.fail_bind {
                return Err(injected_failure());
            }
            let mut orders = self.orders.lock().unwrap();
            let order = orders.get_mut(&order_id).ok_or(AppError::OrderNotFound)?;
            order.qr_code_id = Some(qr_code_id);
            order.qr_code_data = Some(qr_code_data.to_string());
            order.qr_code_signature = Some(qr_code_signature.to_string());
            Ok(order.clone())
        }
    }

    #[derive(Default)]
    struct MemoryStorage {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        fail_put: bool,
    }

    #[async_trait]
    impl ObjectStorage for MemoryStorage {
        async fn put_object(
            &self,
            key: &str,
            bytes: Vec<u8>,
            _content_type: &str,
        ) -> anyhow::Result<String> {
            if self.fail_put {
                anyhow::bail!("falha injetada no upload");
            }
            self.objects.lock().unwrap().insert(key.to_string(), bytes);
            Ok(format!("memory://{}", key))
        }

        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }
    }

    struct FailingRenderer;

    impl QrImageRenderer for FailingRenderer {
        fn render_png(&self, _data: &str) -> Result<Vec<u8>, AppError> {
            Err(injected_failure())
        }
    }

    // --- Montagem ---

    struct Harness {
        store: Arc<MemoryStore>,
        storage: Arc<MemoryStorage>,
        service: OrderCreationService,
    }

    fn harness(store: MemoryStore, storage: MemoryStorage, fail_render: bool) -> Harness {
        let store = Arc::new(store);
        let storage = Arc::new(storage);
        let renderer: Arc<dyn QrImageRenderer> = if fail_render {
            Arc::new(FailingRenderer)
        } else {
            Arc::new(PngQrRenderer)
        };
        let service = OrderCreationService::new(
            Arc::clone(&store) as Arc<dyn CreationStore>,
            Arc::clone(&storage) as Arc<dyn ObjectStorage>,
            renderer,
            SignatureService::new("segredo-de-teste".to_string()),
        );
        Harness {
            store,
            storage,
            service,
        }
    }

    fn sample_data() -> CreateOrderData {
        CreateOrderData {
            order_number: None,
            loading_point: PointPayload {
                name: "CD Guarulhos".to_string(),
                address: Some("Rod. Presidente Dutra, km 225".to_string()),
                location: Some(serde_json::json!({
                    "latitude": -23.4356,
                    "longitude": -46.4731
                })),
                window_start: None,
                window_end: None,
            },
            unloading_point: PointPayload {
                name: "Filial Curitiba".to_string(),
                address: None,
                location: None,
                window_start: None,
                window_end: None,
            },
            assigned_driver_id: None,
            waypoints: None,
            notes: None,
        }
    }

    fn assert_no_orphans(h: &Harness) {
        assert!(h.store.orders.lock().unwrap().is_empty(), "pedido órfão");
        assert!(h.store.qr_codes.lock().unwrap().is_empty(), "qr_code órfão");
        assert!(
            h.storage.objects.lock().unwrap().is_empty(),
            "arquivo órfão no storage"
        );
    }

    fn assert_step(error: AppError, expected: &'static str) {
        match error {
            AppError::Upstream { step, .. } => assert_eq!(step, expected),
            other => panic!("esperava Upstream na etapa '{}', veio {:?}", expected, other),
        }
    }

    // --- Testes ---

    #[tokio::test]
    async fn happy_path_binds_all_five_artifacts() {
        let h = harness(MemoryStore::default(), MemoryStorage::default(), false);
        let tenant = Uuid::new_v4();

        let result = h
            .service
            .create_order(tenant, Uuid::new_v4(), sample_data())
            .await
            .unwrap();

        assert_eq!(result.order.status, OrderStatus::Pending);
        assert_eq!(result.order.qr_code_id, Some(result.qr_code.id));
        assert!(result.order.qr_code_data.is_some());
        assert_eq!(
            result.qr_code.image_url.as_deref(),
            Some(result.qr_code_url.as_str())
        );
        assert!(result.qr_code_url.starts_with("memory://qr_order_"));

        assert_eq!(h.store.orders.lock().unwrap().len(), 1);
        assert_eq!(h.store.qr_codes.lock().unwrap().len(), 1);
        assert_eq!(h.storage.objects.lock().unwrap().len(), 1);

        // O payload do QR é decodificável e verifica com o mesmo segredo.
        let payload =
            SignatureService::decode_payload(result.order.qr_code_data.as_deref().unwrap())
                .unwrap();
        assert_eq!(payload.order_id, result.order.id);
    }

    #[tokio::test]
    async fn failure_at_step_1_leaves_nothing_behind() {
        let h = harness(
            MemoryStore {
                fail_insert_order: true,
                ..Default::default()
            },
            MemoryStorage::default(),
            false,
        );

        let error = h
            .service
            .create_order(Uuid::new_v4(), Uuid::new_v4(), sample_data())
            .await
            .unwrap_err();

        assert_step(error, STEP_CREATE_ORDER);
        assert_no_orphans(&h);
    }

    #[tokio::test]
    async fn failure_at_step_2_rolls_back_the_order() {
        let h = harness(
            MemoryStore {
                fail_insert_qr: true,
                ..Default::default()
            },
            MemoryStorage::default(),
            false,
        );

        let error = h
            .service
            .create_order(Uuid::new_v4(), Uuid::new_v4(), sample_data())
            .await
            .unwrap_err();

        assert_step(error, STEP_CREATE_QR);
        assert_no_orphans(&h);
    }

    #[tokio::test]
    async fn failure_at_step_3_rolls_back_qr_and_order() {
        let h = harness(MemoryStore::default(), MemoryStorage::default(), true);

        let error = h
            .service
            .create_order(Uuid::new_v4(), Uuid::new_v4(), sample_data())
            .await
            .unwrap_err();

        assert_step(error, STEP_RENDER);
        assert_no_orphans(&h);
    }

    #[tokio::test]
    async fn failure_at_step_4_rolls_back_qr_and_order() {
        let h = harness(
            MemoryStore::default(),
            MemoryStorage {
                fail_put: true,
                ..Default::default()
            },
            false,
        );

        let error = h
            .service
            .create_order(Uuid::new_v4(), Uuid::new_v4(), sample_data())
            .await
            .unwrap_err();

        assert_step(error, STEP_UPLOAD);
        assert_no_orphans(&h);
    }

    #[tokio::test]
    async fn failure_at_step_5_removes_the_uploaded_file_too() {
        let h = harness(
            MemoryStore {
                fail_set_image_url: true,
                ..Default::default()
            },
            MemoryStorage::default(),
            false,
        );

        let error = h
            .service
            .create_order(Uuid::new_v4(), Uuid::new_v4(), sample_data())
            .await
            .unwrap_err();

        assert_step(error, STEP_SET_URL);
        assert_no_orphans(&h);
    }

    #[tokio::test]
    async fn failure_at_bind_removes_everything() {
        let h = harness(
            MemoryStore {
                fail_bind: true,
                ..Default::default()
            },
            MemoryStorage::default(),
            false,
        );

        let error = h
            .service
            .create_order(Uuid::new_v4(), Uuid::new_v4(), sample_data())
            .await
            .unwrap_err();

        assert_step(error, STEP_BIND);
        assert_no_orphans(&h);
    }

    #[tokio::test]
    async fn invalid_coordinates_fail_before_any_side_effect() {
        let h = harness(MemoryStore::default(), MemoryStorage::default(), false);
        let mut data = sample_data();
        data.loading_point.location = Some(serde_json::json!({
            "latitude": 91.0,
            "longitude": 0.0
        }));

        let error = h
            .service
            .create_order(Uuid::new_v4(), Uuid::new_v4(), data)
            .await
            .unwrap_err();

        assert!(matches!(error, AppError::BadRequest(_)));
        assert_no_orphans(&h);
    }

    #[test]
    fn png_renderer_produces_a_png() {
        let png = PngQrRenderer.render_png("conteudo-de-teste").unwrap();
        // Assinatura mágica do PNG
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }
}

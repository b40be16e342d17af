// src/common/saga.rs

use futures::future::BoxFuture;

use crate::common::error::AppError;

// Uma compensação registrada: o nome da etapa que ela desfaz e o future
// que executa o "undo" (deletar a linha, remover o arquivo etc).
type Compensation = (&'static str, BoxFuture<'static, Result<(), AppError>>);

// Saga: a lista ordenada de (etapa, compensação) que substitui a transação
// que o storage não nos dá. Cada etapa efetiva do pipeline registra a sua
// compensação logo depois de executar; se uma etapa seguinte falhar, as
// compensações rodam em ordem reversa.
//
// Invariante: ou `commit()` ou `fail()` é chamado antes do drop. Falha de
// compensação é logada e não mascara o erro original.
pub struct Saga {
    label: &'static str,
    compensations: Vec<Compensation>,
}

impl Saga {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            compensations: Vec::new(),
        }
    }

    // Registra a compensação da etapa que acabou de executar com sucesso.
    pub fn push(
        &mut self,
        step: &'static str,
        compensation: BoxFuture<'static, Result<(), AppError>>,
    ) {
        self.compensations.push((step, compensation));
    }

    pub fn steps_recorded(&self) -> usize {
        self.compensations.len()
    }

    // Pipeline completo: descarta as compensações.
    pub fn commit(mut self) {
        self.compensations.clear();
    }

    // Etapa `step` falhou: roda todas as compensações em ordem reversa e
    // devolve o erro original embrulhado com o nome da etapa.
    pub async fn fail(self, step: &'static str, error: AppError) -> AppError {
        let label = self.label;
        tracing::warn!(
            "Saga '{}': etapa '{}' falhou, iniciando rollback de {} etapa(s)",
            label,
            step,
            self.compensations.len()
        );
        self.compensate().await;

        AppError::Upstream {
            step,
            source: anyhow::Error::new(error),
        }
    }

    // Executa as compensações registradas, da última para a primeira.
    // Uma compensação que falha não interrompe as demais.
    async fn compensate(mut self) {
        while let Some((step, compensation)) = self.compensations.pop() {
            match compensation.await {
                Ok(()) => {
                    tracing::info!("Saga '{}': compensação de '{}' executada", self.label, step);
                }
                Err(e) => {
                    tracing::warn!(
                        "Saga '{}': compensação de '{}' falhou (seguindo com as demais): {:?}",
                        self.label,
                        step,
                        e
                    );
                }
            }
        }
    }
}

impl Drop for Saga {
    fn drop(&mut self) {
        if !self.compensations.is_empty() {
            tracing::warn!(
                "Saga '{}' descartada com {} compensação(ões) pendente(s)",
                self.label,
                self.compensations.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording(
        log: &Arc<Mutex<Vec<&'static str>>>,
        step: &'static str,
        result: Result<(), AppError>,
    ) -> BoxFuture<'static, Result<(), AppError>> {
        let log = Arc::clone(log);
        Box::pin(async move {
            log.lock().unwrap().push(step);
            result
        })
    }

    #[tokio::test]
    async fn fail_runs_compensations_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut saga = Saga::new("teste");
        saga.push("criar_pedido", recording(&log, "deletar_pedido", Ok(())));
        saga.push("criar_qr", recording(&log, "deletar_qr", Ok(())));
        saga.push("upload_imagem", recording(&log, "remover_arquivo", Ok(())));
        assert_eq!(saga.steps_recorded(), 3);

        let error = saga
            .fail("vincular_qr", AppError::BadRequest("boom".into()))
            .await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["remover_arquivo", "deletar_qr", "deletar_pedido"]
        );
        assert!(matches!(
            error,
            AppError::Upstream {
                step: "vincular_qr",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn commit_discards_compensations() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut saga = Saga::new("teste");
        saga.push("criar_pedido", recording(&log, "deletar_pedido", Ok(())));
        saga.commit();

        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_compensation_does_not_stop_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut saga = Saga::new("teste");
        saga.push("criar_pedido", recording(&log, "deletar_pedido", Ok(())));
        saga.push(
            "criar_qr",
            recording(
                &log,
                "deletar_qr",
                Err(AppError::BadRequest("falhou".into())),
            ),
        );

        saga.fail("upload_imagem", AppError::BadRequest("boom".into()))
            .await;

        // Mesmo com a compensação do QR falhando, a do pedido roda.
        assert_eq!(*log.lock().unwrap(), vec!["deletar_qr", "deletar_pedido"]);
    }
}

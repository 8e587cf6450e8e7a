//! JSON shapes of the results API and their conversion into domain types.
//!
//! Field names mirror the server's Spanish keys; everything past this module
//! works with the English domain types in `crate::types`.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::Outcome;
use crate::catalog;
use crate::dates;
use crate::error::Result;
use crate::types::{
    AnimalPattern, AnimalSearch, AutoScrapingStatus, CandidatePattern, CoincidenceDate,
    CoincidenceSearch, DatabaseStats, DrawRecord, DuplicateReport, Forecast, ForecastReport,
    MultiLotteryPattern, MultiLotterySearch, PatternSearch, ReferenceSet,
};

/// Decode a successful response body. A top-level `error` string means the
/// server declined the analysis; anything else must match `T`.
///
/// Works on raw bytes instead of `serde_json::Value` so map key order
/// survives for the frequency table.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<Outcome<T>> {
    #[derive(Deserialize)]
    struct ErrorProbe {
        #[serde(default)]
        error: Option<String>,
    }

    if let Ok(ErrorProbe { error: Some(message) }) = serde_json::from_slice::<ErrorProbe>(body) {
        return Ok(Outcome::Rejected(message));
    }
    Ok(Outcome::Ready(serde_json::from_slice(body)?))
}

// ---------------------------------------------------------------------------
// Day listings (/api/patrones/referencia, /api/coincidencias/dia)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct DayResponse {
    #[serde(default)]
    pub resultados: Vec<DayRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DayRow {
    pub horario: String,
    pub codigo: String,
    #[serde(default)]
    pub nombre: String,
}

impl DayResponse {
    /// Draws in chronological slot order, stamped with the requested day.
    pub fn into_draws(self, lottery: &str, date: NaiveDate) -> Vec<DrawRecord> {
        let mut draws: Vec<DrawRecord> = self
            .resultados
            .into_iter()
            .map(|row| DrawRecord {
                date,
                lottery: lottery.to_string(),
                schedule: row.horario,
                animal_code: row.codigo,
                animal_name: row.nombre,
            })
            .collect();
        draws.sort_by_key(|d| catalog::schedule_minutes(&d.schedule).unwrap_or(0));
        draws
    }
}

// ---------------------------------------------------------------------------
// Pattern searches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FutureRow {
    #[serde(default)]
    pub horario: String,
    pub animalito: String,
    #[serde(default)]
    pub nombre_animalito: String,
}

impl FutureRow {
    fn into_draw(self, lottery: &str, date: NaiveDate) -> DrawRecord {
        DrawRecord {
            date,
            lottery: lottery.to_string(),
            schedule: self.horario,
            animal_code: self.animalito,
            animal_name: self.nombre_animalito,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternRow {
    #[serde(deserialize_with = "dates::deserialize_local")]
    pub fecha: NaiveDate,
    pub similitud: f64,
    pub aciertos: u32,
    #[serde(default)]
    pub total_comparaciones: u32,
    #[serde(default)]
    pub resultados_futuros: Vec<FutureRow>,
    #[serde(default)]
    pub total_futuros: u32,
}

impl PatternRow {
    fn into_candidate(self, lottery: &str) -> CandidatePattern {
        let date = self.fecha;
        CandidatePattern {
            date,
            lottery: lottery.to_string(),
            similarity: self.similitud,
            hits: self.aciertos,
            total_comparisons: self.total_comparaciones,
            total_future: self.total_futuros,
            future_draws: self
                .resultados_futuros
                .into_iter()
                .map(|f| f.into_draw(lottery, date))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternResponse {
    #[serde(default)]
    pub patrones_similares: Vec<PatternRow>,
    #[serde(default)]
    pub resultados_referencia: HashMap<String, String>,
    #[serde(default)]
    pub horarios_referencia: Vec<String>,
    #[serde(default)]
    pub total_analizados: u32,
}

impl PatternResponse {
    pub fn into_search(self, lottery: &str, reference_date: NaiveDate, from: NaiveDate, to: NaiveDate) -> PatternSearch {
        PatternSearch {
            lottery: lottery.to_string(),
            reference_date,
            from,
            to,
            candidates: self
                .patrones_similares
                .into_iter()
                .map(|p| p.into_candidate(lottery))
                .collect(),
            reference: ReferenceSet::new(self.resultados_referencia, self.horarios_referencia),
            total_analyzed: self.total_analizados,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimalPatternRow {
    #[serde(deserialize_with = "dates::deserialize_local")]
    pub fecha: NaiveDate,
    pub similitud: f64,
    pub aciertos: u32,
    #[serde(default)]
    pub animales_referencia: u32,
    #[serde(default)]
    pub animales_historicos: u32,
    #[serde(default)]
    pub animales_futuros: Vec<FutureRow>,
    #[serde(default)]
    pub total_futuros: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnimalPatternResponse {
    #[serde(default)]
    pub patrones_similares: Vec<AnimalPatternRow>,
    #[serde(default)]
    pub animales_referencia: Vec<String>,
    #[serde(default)]
    pub total_analizados: u32,
}

impl AnimalPatternResponse {
    pub fn into_search(self, lottery: &str, reference_date: NaiveDate) -> AnimalSearch {
        let candidates = self
            .patrones_similares
            .into_iter()
            .map(|row| {
                let date = row.fecha;
                AnimalPattern {
                    pattern: CandidatePattern {
                        date,
                        lottery: lottery.to_string(),
                        similarity: row.similitud,
                        hits: row.aciertos,
                        total_comparisons: row.animales_referencia,
                        total_future: row.total_futuros,
                        future_draws: row
                            .animales_futuros
                            .into_iter()
                            .map(|f| f.into_draw(lottery, date))
                            .collect(),
                    },
                    reference_animals: row.animales_referencia,
                    historical_animals: row.animales_historicos,
                }
            })
            .collect();

        AnimalSearch {
            lottery: lottery.to_string(),
            reference_date,
            candidates,
            reference_animals: self.animales_referencia,
            total_analyzed: self.total_analizados,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiLotteryRow {
    pub loteria_comparada: String,
    #[serde(deserialize_with = "dates::deserialize_local")]
    pub fecha_comparada: NaiveDate,
    pub similitud: f64,
    pub aciertos: u32,
    #[serde(default)]
    pub total_comparaciones: u32,
    #[serde(default)]
    pub resultados_futuros: Vec<FutureRow>,
    #[serde(default)]
    pub total_futuros: u32,
    #[serde(default)]
    pub horarios_referencia: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiLotteryResponse {
    #[serde(default)]
    pub patrones_multiloterias: Vec<MultiLotteryRow>,
    #[serde(default)]
    pub resultados_referencia: HashMap<String, String>,
    #[serde(default)]
    pub horarios_referencia: Vec<String>,
}

impl MultiLotteryResponse {
    pub fn into_search(self, lottery: &str, reference_date: NaiveDate) -> MultiLotterySearch {
        let candidates = self
            .patrones_multiloterias
            .into_iter()
            .map(|row| {
                // Future draws belong to the compared lottery's day.
                let compared = row.loteria_comparada;
                let date = row.fecha_comparada;
                let mut reference_schedules = row.horarios_referencia;
                catalog::sort_schedules(&mut reference_schedules);
                MultiLotteryPattern {
                    pattern: CandidatePattern {
                        date,
                        lottery: compared.clone(),
                        similarity: row.similitud,
                        hits: row.aciertos,
                        total_comparisons: row.total_comparaciones,
                        total_future: row.total_futuros,
                        future_draws: row
                            .resultados_futuros
                            .into_iter()
                            .map(|f| f.into_draw(&compared, date))
                            .collect(),
                    },
                    reference_schedules,
                }
            })
            .collect();

        MultiLotterySearch {
            lottery: lottery.to_string(),
            reference_date,
            candidates,
            reference: ReferenceSet::new(self.resultados_referencia, self.horarios_referencia),
        }
    }
}

// ---------------------------------------------------------------------------
// Forecasts
// ---------------------------------------------------------------------------

/// One ranked row. `numero` is the animal code and `animalito` its name here,
/// unlike the pattern payloads.
#[derive(Debug, Clone, Deserialize)]
pub struct ForecastRow {
    pub numero: String,
    #[serde(default)]
    pub animalito: String,
    #[serde(default)]
    pub puntuacion: Option<f64>,
    #[serde(default)]
    pub puntuacion_total: Option<f64>,
    #[serde(default)]
    pub frecuencia: Option<f64>,
    #[serde(default)]
    pub fechas_aparicion: Option<u32>,
    #[serde(default)]
    pub fuentes: Option<u32>,
    #[serde(default)]
    pub detalles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub pronosticos: Vec<ForecastRow>,
    #[serde(default)]
    pub mejor_similitud: Option<f64>,
    #[serde(default)]
    pub max_aciertos: Option<u32>,
}

impl From<ForecastResponse> for ForecastReport {
    fn from(resp: ForecastResponse) -> Self {
        let forecasts = resp
            .pronosticos
            .into_iter()
            .map(|row| Forecast {
                score: row.puntuacion.or(row.puntuacion_total).unwrap_or(0.0),
                animal_code: row.numero,
                animal_name: row.animalito,
                frequency: row.frecuencia,
                appearances: row.fechas_aparicion,
                sources: row.fuentes,
                details: row.detalles,
            })
            .collect();
        ForecastReport {
            forecasts,
            best_similarity: resp.mejor_similitud,
            max_hits: resp.max_aciertos,
        }
    }
}

// ---------------------------------------------------------------------------
// Coincidences
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CoincidenceRow {
    #[serde(deserialize_with = "dates::deserialize_local")]
    pub fecha: NaiveDate,
    pub horario_animal1: String,
    pub horario_animal2: String,
    #[serde(default)]
    pub posicion: u32,
    #[serde(default)]
    pub total_resultados_dia: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoincidenceResponse {
    #[serde(default)]
    pub fechas_coincidentes: Vec<CoincidenceRow>,
    #[serde(default)]
    pub total_coincidencias: u32,
    #[serde(default)]
    pub nombre_animal1: String,
    #[serde(default)]
    pub nombre_animal2: String,
}

impl CoincidenceResponse {
    pub fn into_search(self, lottery: &str, first_animal: &str, second_animal: &str) -> CoincidenceSearch {
        CoincidenceSearch {
            lottery: lottery.to_string(),
            first_animal: first_animal.to_string(),
            second_animal: second_animal.to_string(),
            first_name: self.nombre_animal1,
            second_name: self.nombre_animal2,
            dates: self
                .fechas_coincidentes
                .into_iter()
                .map(|row| CoincidenceDate {
                    date: row.fecha,
                    first_schedule: row.horario_animal1,
                    second_schedule: row.horario_animal2,
                    position: row.posicion,
                    draws_that_day: row.total_resultados_dia,
                })
                .collect(),
            total: self.total_coincidencias,
        }
    }
}

// ---------------------------------------------------------------------------
// Auxiliary endpoints
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ResultRow {
    #[serde(deserialize_with = "dates::deserialize_local")]
    pub fecha: NaiveDate,
    pub loteria: String,
    pub horario_sorteo: String,
    pub animalito_ganador: String,
    #[serde(default)]
    pub animalito_nombre: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultsResponse {
    #[serde(default)]
    pub resultados: Vec<ResultRow>,
}

impl From<ResultsResponse> for Vec<DrawRecord> {
    fn from(resp: ResultsResponse) -> Self {
        resp.resultados
            .into_iter()
            .map(|row| DrawRecord {
                date: row.fecha,
                lottery: row.loteria,
                schedule: row.horario_sorteo,
                animal_code: row.animalito_ganador,
                animal_name: row.animalito_nombre,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub fecha_min: Option<String>,
    #[serde(default)]
    pub fecha_max: Option<String>,
}

/// The server reports an empty table as `N/A`.
fn known_date(raw: Option<String>) -> Option<String> {
    raw.filter(|d| !d.is_empty() && d != "N/A")
}

impl From<StatsResponse> for DatabaseStats {
    fn from(resp: StatsResponse) -> Self {
        DatabaseStats {
            total: resp.total,
            first_date: known_date(resp.fecha_min),
            last_date: known_date(resp.fecha_max),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoScrapingResponse {
    #[serde(default)]
    pub activo: bool,
    #[serde(default)]
    pub ultima_actualizacion: String,
}

impl From<AutoScrapingResponse> for AutoScrapingStatus {
    fn from(resp: AutoScrapingResponse) -> Self {
        AutoScrapingStatus {
            active: resp.activo,
            last_update: resp.ultima_actualizacion,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapingResponse {
    #[serde(default)]
    pub total_resultados: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DuplicatesResponse {
    #[serde(default)]
    pub total_grupos_duplicados: u64,
    #[serde(default)]
    pub total_registros_duplicados: u64,
}

impl From<DuplicatesResponse> for DuplicateReport {
    fn from(resp: DuplicatesResponse) -> Self {
        DuplicateReport {
            groups: resp.total_grupos_duplicados,
            records: resp.total_registros_duplicados,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemovalResponse {
    #[serde(default)]
    pub registros_eliminados: u64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

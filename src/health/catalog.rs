//! 端点检测目录
//!
//! 编译期固定的端点检测列表，按功能分组、按顺序执行。
//! 路径与请求体是目标API的外部契约。

use reqwest::Method;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

/// 单个端点检测定义
#[derive(Debug, Clone, Serialize)]
pub struct EndpointCheck {
    /// 检测名称
    pub name: String,
    /// 功能分组
    pub group: String,
    /// HTTP方法（仅支持GET/POST）
    #[serde(serialize_with = "serialize_method")]
    pub method: Method,
    /// 相对于基础URL的路径
    pub path: String,
    /// 期望的状态码
    pub expected_status: u16,
    /// 请求体（POST）
    pub body: Option<Value>,
    /// 成功后对响应内容的日志检查
    #[serde(skip)]
    pub inspection: Option<Inspection>,
}

fn serialize_method<S: serde::Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(method.as_str())
}

impl EndpointCheck {
    /// 创建GET检测，期望200
    pub fn get(group: &str, name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
            method: Method::GET,
            path: path.to_string(),
            expected_status: 200,
            body: None,
            inspection: None,
        }
    }

    /// 创建POST检测，期望200
    pub fn post(group: &str, name: &str, path: &str, body: Value) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
            method: Method::POST,
            path: path.to_string(),
            expected_status: 200,
            body: Some(body),
            inspection: None,
        }
    }

    /// 设置期望的状态码
    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    /// 设置响应检查
    pub fn inspect(mut self, inspection: Inspection) -> Self {
        self.inspection = Some(inspection);
        self
    }

    /// 拼接完整URL
    pub fn url(&self, base_url: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            self.path.trim_start_matches('/')
        )
    }
}

/// 成功响应的日志检查
///
/// 仅用于输出可读的业务字段，字段缺失时记录 "N/A"，从不影响运行结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inspection {
    /// 客户资料：名称、seqpessoa、授信额度
    CreditCustomer,
    /// 客户票据：逾期与按时付款数
    CreditTitles,
    /// 近六个月采购均值
    PurchaseAverage,
    /// 已实现金额
    BonusRealized,
    /// 预算金额
    BonusBudgeted,
}

impl Inspection {
    /// 检查响应内容并输出日志
    pub fn log_fields(&self, check_name: &str, payload: &Value) {
        match self {
            Inspection::CreditCustomer => {
                let Some(customer) = data_object(check_name, payload) else {
                    return;
                };
                info!("客户: {}", text_field(customer, "nomerazao"));
                info!("SEQPESSOA: {}", text_field(customer, "seqpessoa"));
                info!("总授信额度: {:.2}", number_field(customer, "limite_global"));
                info!("分段合计: {:.2}", number_field(customer, "soma_segmentos"));
            }
            Inspection::CreditTitles => {
                let Some(titles) = data_object(check_name, payload) else {
                    return;
                };
                info!("逾期票据: {}", text_field_or(titles, "nro_de_atrasos", "0"));
                info!("按时付款: {}", text_field_or(titles, "pagtos_em_dia", "0"));
            }
            Inspection::PurchaseAverage => {
                if let Some(is_network) = payload.get("eh_rede").and_then(Value::as_bool) {
                    info!("是否连锁: {}", if is_network { "是" } else { "否" });
                    if is_network {
                        let members = payload
                            .get("seqpessoas_rede")
                            .and_then(Value::as_array)
                            .map_or(0, Vec::len);
                        info!("连锁客户数: {}", members);
                    }
                }
                match payload.get("dados").and_then(Value::as_array) {
                    Some(months) => {
                        info!("有采购的月份: {}", months.len());
                        if !months.is_empty() {
                            let total: f64 = months
                                .iter()
                                .map(|m| number_field(m, "vlr_total_mes"))
                                .sum();
                            info!("采购总额: {:.2}", total);
                        }
                    }
                    None => warn!("{} 响应中缺少 dados 列表", check_name),
                }
            }
            Inspection::BonusRealized | Inspection::BonusBudgeted => {
                let Some(value) = data_object(check_name, payload) else {
                    return;
                };
                let (label, key) = match self {
                    Inspection::BonusRealized => ("已实现金额", "valor_realizado"),
                    _ => ("预算金额", "valor_orcado"),
                };
                info!("会计科目: {}", text_field(value, "conta_contabil"));
                info!("成本中心: {}", text_field(value, "centro_custo"));
                info!("{}: {:.2}", label, number_field(value, key));
            }
        }
    }
}

fn data_object<'a>(check_name: &str, payload: &'a Value) -> Option<&'a Value> {
    let data = payload.get("dados").filter(|v| !v.is_null());
    if data.is_none() {
        warn!("{} 响应中缺少 dados 字段", check_name);
    }
    data
}

fn text_field(value: &Value, key: &str) -> String {
    text_field_or(value, key, "N/A")
}

fn text_field_or(value: &Value, key: &str, fallback: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => fallback.to_string(),
    }
}

fn number_field(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// 默认检测目录
pub fn default_catalog() -> Vec<EndpointCheck> {
    const REPOSITORY: &str = "Repository";
    const CONSULTATION: &str = "Consultation";
    const SCHEDULER: &str = "Processing control";
    const DAILY_LIMIT: &str = "Daily limit";
    const HR: &str = "HR";
    const BLIP: &str = "BLIP";
    const CREDIT: &str = "Credit request";
    const BONUS: &str = "Bonus request";

    vec![
        EndpointCheck::get(REPOSITORY, "Fetch RCA", "/cctablet/rca/555"),
        EndpointCheck::get(
            REPOSITORY,
            "Validate RCA CNPJ",
            "/cctablet/valida_cnpj_rca/3859930000193",
        ),
        EndpointCheck::get(REPOSITORY, "Validate CEP", "/cctablet/valida_cep/37710326"),
        EndpointCheck::get(
            REPOSITORY,
            "Validate email (typed)",
            "/cctablet/valida_email/joycegarciasarracini123@gmail.com/cliente",
        ),
        EndpointCheck::get(
            REPOSITORY,
            "Validate phone (typed)",
            "/cctablet/valida_telefone/19989601978/cliente",
        ),
        EndpointCheck::get(
            REPOSITORY,
            "Validate customer situation",
            "/cctablet/valida_situacao_cliente/40630223000157",
        ),
        EndpointCheck::get(
            REPOSITORY,
            "Validate email (untyped)",
            "/cctablet/valida_email/joycegarciasarracini123@gmail.com",
        ),
        EndpointCheck::get(
            REPOSITORY,
            "Validate phone (untyped)",
            "/cctablet/valida_telefone/19989601978",
        ),
        EndpointCheck::get(
            CONSULTATION,
            "Consult APIs",
            "/cctablet/consulta_apis/40630223000157",
        ),
        EndpointCheck::get(
            CONSULTATION,
            "Fetch APV seqpessoa",
            "/cctablet/seqpessoa_apv/40630223000157",
        ),
        EndpointCheck::get(SCHEDULER, "Processing status", "/cctablet/processamento/status"),
        EndpointCheck::get(DAILY_LIMIT, "Daily limit status", "/cctablet/limite_diario/status"),
        EndpointCheck::post(
            HR,
            "Search employee",
            "/rh/buscar_funcionario",
            json!({ "dados": "CRISTH" }),
        ),
        EndpointCheck::post(
            HR,
            "Employee details",
            "/rh/dados_funcionario",
            json!({ "cracha": "1007", "nome": "FABIO BENEDITO DOS SANTOS" }),
        ),
        EndpointCheck::post(
            BLIP,
            "Validate BLIP customer",
            "/blip/validar_cliente",
            json!({
                "cnpj": "09096291000138",
                "email": "jadsoncampinas@hotmail.com",
                "telefones": ["19992943543", "", "19996115022"]
            }),
        ),
        EndpointCheck::post(
            BLIP,
            "BLIP RCA titles",
            "/blip/consultar_titulos_rca",
            json!({ "cod_rca": "555", "seqpessoa": 41063, "cnpj": "17097937000120" }),
        ),
        EndpointCheck::get(
            BLIP,
            "BLIP customer company",
            "/blip/empresa_cliente/09096291000138",
        ),
        EndpointCheck::post(
            CREDIT,
            "Customer data by CNPJ",
            "/solicitacao_credito/cliente",
            json!({ "cnpj": "44534878000182" }),
        )
        .inspect(Inspection::CreditCustomer),
        EndpointCheck::post(
            CREDIT,
            "Customer titles",
            "/solicitacao_credito/titulos",
            json!({ "seqpessoa": 69306 }),
        )
        .inspect(Inspection::CreditTitles),
        EndpointCheck::post(
            CREDIT,
            "Purchase average (last 6 months)",
            "/solicitacao_credito/media_compras",
            json!({ "seqpessoa": 69306 }),
        )
        .inspect(Inspection::PurchaseAverage),
        EndpointCheck::post(
            BONUS,
            "Realized amount",
            "/solicitacao_bonus/valor_realizado",
            json!({ "conta_contabil": "41104036", "centro_custo": "6060" }),
        )
        .inspect(Inspection::BonusRealized),
        EndpointCheck::post(
            BONUS,
            "Budgeted amount",
            "/solicitacao_bonus/valor_orcado",
            json!({ "conta_contabil": "41104036", "centro_custo": "6060" }),
        )
        .inspect(Inspection::BonusBudgeted),
    ]
}

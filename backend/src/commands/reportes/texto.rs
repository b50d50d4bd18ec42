use crate::commands::utility::{format_fecha_ar, format_fecha_hora_ar};
use crate::db::{Cultivo, Entrega, UsuarioFinal};
use chrono::{DateTime, Utc};

pub const ENCABEZADO: &str = "FECANBO - Federación Cannábica Bonaerense";
pub const TITULO_CULTIVO: &str = "Reporte de Cultivo Medicinal";
pub const TITULO_ENTREGA: &str = "Comprobante de Entrega de Cannabis Medicinal";
const SEPARADOR: &str = "========================================";
const PIE: &str = "Sistema FECANBO - Trazabilidad de Cannabis Medicinal";

fn or_na(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("N/A")
}

struct Documento {
    lineas: Vec<String>,
}

impl Documento {
    fn new(titulo: &str) -> Self {
        let mut doc = Documento { lineas: Vec::new() };
        doc.push(ENCABEZADO);
        doc.push(titulo);
        doc.blank();
        doc.push(SEPARADOR);
        doc
    }

    fn push(&mut self, linea: impl Into<String>) {
        self.lineas.push(linea.into());
    }

    fn blank(&mut self) {
        self.lineas.push(String::new());
    }

    fn seccion(&mut self, nombre: &str) {
        self.blank();
        self.push(nombre);
        self.push(SEPARADOR);
    }

    fn campo(&mut self, etiqueta: &str, valor: impl std::fmt::Display) {
        self.push(format!("{}: {}", etiqueta, valor));
    }

    fn notas(&mut self, titulo: &str, notas: Option<&str>) {
        if let Some(n) = notas.filter(|n| !n.trim().is_empty()) {
            self.blank();
            self.push(titulo);
            self.lineas.extend(n.lines().map(str::to_string));
        }
    }

    fn cierre(&mut self, generado: DateTime<Utc>) {
        self.blank();
        self.push(SEPARADOR);
        self.campo("Documento generado el", format_fecha_hora_ar(generado));
    }

    fn finish(self) -> String {
        self.lineas.join("\n")
    }
}

pub fn reporte_cultivo(cultivo: &Cultivo, generado: DateTime<Utc>) -> String {
    let mut doc = Documento::new(TITULO_CULTIVO);
    doc.seccion("INFORMACIÓN DEL CULTIVO");
    doc.campo("Nombre", &cultivo.nombre);
    doc.campo("Variedad", or_na(cultivo.variedad.as_deref()));
    doc.campo("Tipo", or_na(cultivo.tipo.as_deref()));
    doc.campo("Propósito", cultivo.proposito.as_deref().unwrap_or("medicinal"));
    doc.blank();
    doc.campo("Estado Actual", &cultivo.estado_actual);
    doc.campo("Fecha de Inicio", format_fecha_ar(cultivo.fecha_inicio));
    if let Some(fecha) = cultivo.fecha_estimada_cosecha {
        doc.campo("Fecha Estimada de Cosecha", format_fecha_ar(fecha));
    }

    doc.seccion("DETALLES DE CULTIVO");
    doc.campo("Cantidad de Plantas", cultivo.cantidad_plantas);
    doc.campo("Método de Cultivo", or_na(cultivo.metodo_cultivo.as_deref()));
    doc.campo("Medio de Cultivo", or_na(cultivo.medio_cultivo.as_deref()));
    if cultivo.ubicacion_descripcion.is_some() || cultivo.latitud.is_some() {
        doc.blank();
    }
    if let Some(ubicacion) = cultivo.ubicacion_descripcion.as_deref() {
        doc.campo("Ubicación", ubicacion);
    }
    if let (Some(lat), Some(lon)) = (cultivo.latitud, cultivo.longitud) {
        doc.campo("Coordenadas", format!("{}, {}", lat, lon));
    }
    doc.notas("NOTAS:", cultivo.notas.as_deref());

    doc.cierre(generado);
    doc.push(PIE);
    doc.finish()
}

pub fn comprobante_entrega(
    entrega: &Entrega,
    cultivo: &Cultivo,
    usuario: &UsuarioFinal,
    generado: DateTime<Utc>,
) -> String {
    let mut doc = Documento::new(TITULO_ENTREGA);
    doc.seccion("INFORMACIÓN DE LA ENTREGA");
    doc.campo("Fecha de Entrega", format_fecha_hora_ar(entrega.fecha_entrega));
    doc.campo("Número de Lote", or_na(entrega.lote.as_deref()));
    doc.campo("Tipo de Producto", &entrega.tipo_producto);
    doc.campo("Cantidad Entregada", format!("{}g", entrega.cantidad_gramos.normalize()));

    doc.seccion("INFORMACIÓN DEL CULTIVO");
    doc.campo("Nombre", &cultivo.nombre);
    doc.campo("Variedad", or_na(cultivo.variedad.as_deref()));
    doc.campo("Método", or_na(cultivo.metodo_cultivo.as_deref()));

    doc.seccion("INFORMACIÓN DEL USUARIO FINAL");
    doc.campo("Nombre", &usuario.nombre_completo);
    doc.campo("Documento", or_na(usuario.documento.as_deref()));
    doc.campo("Condición Médica", or_na(usuario.condicion_medica.as_deref()));
    doc.campo("Dosis Recomendada", or_na(usuario.dosis_recomendada.as_deref()));
    doc.notas("NOTAS DE LA ENTREGA:", entrega.notas.as_deref());

    doc.cierre(generado);
    doc.blank();
    doc.push("Este comprobante certifica la entrega de cannabis medicinal");
    doc.push("para uso terapéutico bajo el marco regulatorio vigente.");
    doc.blank();
    doc.push(PIE);
    doc.finish()
}

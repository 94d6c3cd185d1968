use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::messaging::OrderPublisher;
use crate::metrics::Metrics;
use crate::models::Order;
use crate::pipeline::OrderAggregator;
use crate::producer::{random_order, OrderIdSource};

// ============================================================================
// Order submission & administrative handlers
// ============================================================================

pub struct ApiState {
    pub aggregator: Arc<OrderAggregator>,
    pub publisher: Arc<dyn OrderPublisher>,
    pub random_ids: Arc<dyn OrderIdSource>,
    pub metrics: Arc<Metrics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub order_id: String,
    pub product: String,
    pub price: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub message: String,
    pub order_id: String,
    pub product: String,
    pub price: f64,
}

/// POST /api/orders/send
pub async fn send_order(state: web::Data<ApiState>, body: web::Json<OrderRequest>) -> impl Responder {
    let request = body.into_inner();
    let order = Order::new(request.order_id, request.product, request.price);

    if let Err(reason) = order.validate() {
        return HttpResponse::BadRequest().json(serde_json::json!({ "error": reason }));
    }

    publish(&state, order, "api", "Order sent successfully").await
}

/// POST /api/orders/send-random
pub async fn send_random_order(state: web::Data<ApiState>) -> impl Responder {
    let order = random_order(state.random_ids.next_id());
    publish(&state, order, "api_random", "Random order sent successfully").await
}

async fn publish(state: &ApiState, order: Order, source: &str, message: &str) -> HttpResponse {
    let published = state.publisher.publish_order(&order).await;
    state.metrics.record_publish(source, published.is_ok());

    match published {
        Ok(_) => HttpResponse::Ok().json(OrderResponse {
            message: message.to_string(),
            order_id: order.order_id,
            product: order.product,
            price: order.price,
        }),
        Err(e) => HttpResponse::BadGateway().json(serde_json::json!({
            "error": e.to_string(),
            "orderId": order.order_id,
        })),
    }
}

/// GET /api/orders/stats
pub async fn get_stats(state: web::Data<ApiState>) -> impl Responder {
    HttpResponse::Ok().json(state.aggregator.snapshot())
}

/// POST /api/orders/stats/reset
pub async fn reset_stats(state: web::Data<ApiState>) -> impl Responder {
    state.aggregator.reset();
    HttpResponse::Ok().body("Statistics reset successfully")
}

/// GET /api/orders/health
pub async fn health() -> impl Responder {
    HttpResponse::Ok().body("Kafka Order System is running!")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::testing::RecordingOrderPublisher;
    use crate::models::OrderStats;
    use crate::producer::SequentialOrderIds;
    use actix_web::{http::StatusCode, test, App};

    fn state(publisher: Arc<RecordingOrderPublisher>, aggregator: Arc<OrderAggregator>) -> web::Data<ApiState> {
        web::Data::new(ApiState {
            aggregator,
            publisher,
            random_ids: Arc::new(SequentialOrderIds::starting_at(1)),
            metrics: Arc::new(Metrics::new().unwrap()),
        })
    }

    #[actix_web::test]
    async fn test_send_order_publishes() {
        let publisher = Arc::new(RecordingOrderPublisher::default());
        let app = test::init_service(
            App::new()
                .app_data(state(publisher.clone(), Arc::new(OrderAggregator::default())))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/orders/send")
            .set_json(serde_json::json!({"orderId": "42", "product": "Laptop", "price": 1200.5}))
            .to_request();
        let resp: OrderResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp.order_id, "42");
        assert_eq!(resp.message, "Order sent successfully");
        assert_eq!(publisher.orders(), vec![Order::new("42", "Laptop", 1200.5)]);
    }

    #[actix_web::test]
    async fn test_send_order_rejects_negative_price() {
        let publisher = Arc::new(RecordingOrderPublisher::default());
        let app = test::init_service(
            App::new()
                .app_data(state(publisher.clone(), Arc::new(OrderAggregator::default())))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/orders/send")
            .set_json(serde_json::json!({"orderId": "43", "product": "Laptop", "price": -1.0}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(publisher.orders().is_empty());
    }

    #[actix_web::test]
    async fn test_send_order_rejects_price_above_ceiling() {
        let publisher = Arc::new(RecordingOrderPublisher::default());
        let app = test::init_service(
            App::new()
                .app_data(state(publisher.clone(), Arc::new(OrderAggregator::default())))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/orders/send")
            .set_json(serde_json::json!({"orderId": "44", "product": "Laptop", "price": 1.0e17}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(publisher.orders().is_empty());
    }

    #[actix_web::test]
    async fn test_publish_failure_is_bad_gateway() {
        let publisher = Arc::new(RecordingOrderPublisher::failing());
        let app = test::init_service(
            App::new()
                .app_data(state(publisher, Arc::new(OrderAggregator::default())))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/orders/send-random").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[actix_web::test]
    async fn test_send_random_order() {
        let publisher = Arc::new(RecordingOrderPublisher::default());
        let app = test::init_service(
            App::new()
                .app_data(state(publisher.clone(), Arc::new(OrderAggregator::default())))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/orders/send-random").to_request();
        let resp: OrderResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp.order_id, "1");
        assert!(resp.price >= 10.0 && resp.price < 1000.0);
        assert_eq!(publisher.orders().len(), 1);
    }

    #[actix_web::test]
    async fn test_stats_and_reset() {
        let aggregator = Arc::new(OrderAggregator::default());
        for price in [10.0, 20.0, 30.0] {
            aggregator.add_order(&Order::new("1", "Item1", price));
        }

        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(RecordingOrderPublisher::default()), aggregator.clone()))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/orders/stats").to_request();
        let stats: OrderStats = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats.total_orders, 3);
        assert_eq!(stats.running_average, 20.0);
        assert_eq!(stats.total_revenue, 60.0);

        let req = test::TestRequest::post().uri("/api/orders/stats/reset").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(aggregator.total_orders(), 0);
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(
            App::new()
                .app_data(state(Arc::new(RecordingOrderPublisher::default()), Arc::new(OrderAggregator::default())))
                .configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/orders/health").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(std::str::from_utf8(&body).unwrap(), "Kafka Order System is running!");
    }
}

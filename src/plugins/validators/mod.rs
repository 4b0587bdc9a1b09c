pub mod product_page;

pub use product_page::ProductPageValidator;

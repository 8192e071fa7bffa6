pub mod proto {
    pub mod workspace {
        pub mod manager {
            pub mod v1 {
                tonic::include_proto!("workspace.manager.v1");
            }
        }
    }
}
